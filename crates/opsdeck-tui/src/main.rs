//! Opsdeck TUI - login screen and live service dashboard
//!
//! Two screens, routed from session state:
//! - Login: user id input and backend picker, shown whenever the session is
//!   unauthenticated (including after a forced logout mid-session)
//! - Dashboard: service health table with refresh, redeploy and logout keys
//!
//! The app subscribes to the session store's watch channel; any mutation
//! re-renders, and a cleared session routes back to the login screen.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use tokio::sync::watch;

use opsdeck_core::config::{Config, KNOWN_BACKENDS};
use opsdeck_core::http::ApiClient;
use opsdeck_core::ops::{DEFAULT_BRANCH, OpsService, ServiceStatus};
use opsdeck_core::session::{AuthService, Session, SessionStore};

enum Screen {
    Login,
    Dashboard,
}

struct App {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
    session_rx: watch::Receiver<Session>,
    config: Config,
    screen: Screen,
    input: String,
    backend_index: usize,
    services: Vec<ServiceStatus>,
    selected: usize,
    notice: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    let session = Arc::new(SessionStore::load(Config::session_path()?));
    let client = Arc::new(
        ApiClient::builder()
            .base_url(&config.backend.base_url)
            .timeout_secs(config.http.timeout_secs)
            .session(session.clone())
            .build()?,
    );

    let backend_index = KNOWN_BACKENDS
        .iter()
        .position(|(_, url)| *url == config.backend.base_url)
        .unwrap_or(0);

    let screen = if session.is_authenticated() {
        Screen::Dashboard
    } else {
        Screen::Login
    };

    let mut app = App {
        session_rx: session.subscribe(),
        client,
        session,
        config,
        screen,
        input: String::new(),
        backend_index,
        services: Vec::new(),
        selected: 0,
        notice: None,
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    if matches!(app.screen, Screen::Dashboard) {
        app.refresh_services().await;
    }

    // Run app
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    loop {
        app.sync_route();

        terminal.draw(|frame| match app.screen {
            Screen::Login => draw_login(frame, app),
            Screen::Dashboard => draw_dashboard(frame, app),
        })?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let quit = match app.screen {
                    Screen::Login => app.handle_login_key(key).await?,
                    Screen::Dashboard => app.handle_dashboard_key(key).await?,
                };
                if quit {
                    return Ok(());
                }
            }
        }
    }
}

impl App {
    /// Route from session state: a cleared session always lands on the
    /// login screen, a freshly authenticated one on the dashboard.
    fn sync_route(&mut self) {
        let authenticated = self.session_rx.borrow().authenticated;
        match self.screen {
            Screen::Dashboard if !authenticated => {
                self.screen = Screen::Login;
                if self.notice.is_none() {
                    self.notice = Some("Session expired. Log in again.".to_string());
                }
            }
            Screen::Login if authenticated => {
                self.screen = Screen::Dashboard;
            }
            _ => {}
        }
    }

    async fn handle_login_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
        match key.code {
            KeyCode::Esc => return Ok(true),
            KeyCode::Tab => self.cycle_backend()?,
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Enter => self.submit_login().await,
            KeyCode::Char(c) if !c.is_control() => self.input.push(c),
            _ => {}
        }
        Ok(false)
    }

    async fn handle_dashboard_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('r') => self.refresh_services().await,
            KeyCode::Char('d') => self.redeploy_selected().await,
            KeyCode::Char('L') => {
                let auth = AuthService::new(self.client.clone(), self.session.clone());
                auth.logout().await;
                self.notice = Some("Logged out.".to_string());
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < self.services.len() {
                    self.selected += 1;
                }
            }
            _ => {}
        }
        Ok(false)
    }

    /// Switch to the next known deployment. Persisted immediately so the
    /// choice survives restarts.
    fn cycle_backend(&mut self) -> anyhow::Result<()> {
        self.backend_index = (self.backend_index + 1) % KNOWN_BACKENDS.len();
        let (_, url) = KNOWN_BACKENDS[self.backend_index];
        self.client.set_base_url(url);
        self.config.backend.base_url = url.to_string();
        self.config.save()?;
        Ok(())
    }

    async fn submit_login(&mut self) {
        // The busy flag guards against a double Enter
        if self.session.is_busy() {
            return;
        }

        let user_id = self.input.trim().to_string();
        let auth = AuthService::new(self.client.clone(), self.session.clone());
        match auth.login(&user_id).await {
            Ok(user) => {
                self.notice = Some(format!("Welcome, {}!", user.display_name()));
                self.refresh_services().await;
            }
            Err(err) => self.notice = Some(format!("Login failed: {err}")),
        }
    }

    async fn refresh_services(&mut self) {
        let ops = OpsService::new(self.client.clone());
        match ops.service_status().await {
            Ok(services) => {
                self.services = services;
                if self.selected >= self.services.len() {
                    self.selected = self.services.len().saturating_sub(1);
                }
            }
            Err(err) => self.notice = Some(format!("Failed to fetch service status: {err}")),
        }
    }

    async fn redeploy_selected(&mut self) {
        let Some(service) = self.services.get(self.selected) else {
            return;
        };
        if !service.status.is_down() {
            self.notice = Some("Only DOWN services can be redeployed.".to_string());
            return;
        }

        let name = service.service_name.clone();
        let ops = OpsService::new(self.client.clone());
        match ops.redeploy(&name, DEFAULT_BRANCH).await {
            Ok(message) => {
                self.notice = Some(format!("{name}: {message}"));
                self.refresh_services().await;
            }
            Err(err) => self.notice = Some(format!("{name}: {err}")),
        }
    }
}

fn draw_login(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(8),    // Form
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    let header = Paragraph::new("Opsdeck")
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title("Login"));
    frame.render_widget(header, chunks[0]);

    let mut lines = vec![
        Line::from(vec![
            Span::raw("User id: "),
            Span::styled(
                format!("{}_", app.input),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from(""),
        Line::from("Backend deployments (Tab to switch):"),
    ];
    for (index, (label, url)) in KNOWN_BACKENDS.iter().enumerate() {
        let (marker, style) = if index == app.backend_index {
            ("> ", Style::default().fg(Color::Green))
        } else {
            ("  ", Style::default())
        };
        lines.push(Line::styled(format!("{marker}{label:<12} {url}"), style));
    }
    if let Some(notice) = &app.notice {
        lines.push(Line::from(""));
        lines.push(Line::styled(
            notice.clone(),
            Style::default().fg(Color::Red),
        ));
    }

    let form = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Sign in"));
    frame.render_widget(form, chunks[1]);

    let footer = Paragraph::new("Enter: Login | Tab: Switch backend | Esc: Quit")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, chunks[2]);
}

fn draw_dashboard(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Service table
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    let session = app.session_rx.borrow().clone();
    let welcome = session
        .user
        .as_ref()
        .map(|user| format!("Welcome, {}!", user.display_name()))
        .unwrap_or_else(|| "Dashboard".to_string());
    let header = Paragraph::new(welcome)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title("Opsdeck"));
    frame.render_widget(header, chunks[0]);

    if app.services.is_empty() {
        let empty = Paragraph::new("No services reported.\n\nPress 'r' to refresh.")
            .block(Block::default().borders(Borders::ALL).title("Service Status"));
        frame.render_widget(empty, chunks[1]);
    } else {
        let rows: Vec<Row> = app
            .services
            .iter()
            .enumerate()
            .map(|(index, service)| {
                let status_style = if service.status.is_down() {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                };
                let row = Row::new(vec![
                    Cell::from(service.service_name.clone()),
                    Cell::from(service.status.as_str()).style(status_style),
                    Cell::from(service.updated_at_display()),
                    Cell::from(if service.status.is_down() { "d: redeploy" } else { "-" }),
                ]);
                if index == app.selected {
                    row.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    row
                }
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(35),
                Constraint::Length(8),
                Constraint::Percentage(30),
                Constraint::Percentage(20),
            ],
        )
        .header(
            Row::new(vec!["SERVICE", "STATUS", "UPDATED", "ACTIONS"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title("Service Status"));
        frame.render_widget(table, chunks[1]);
    }

    let keys = "r: Refresh | d: Redeploy | Up/Down: Select | L: Logout | q: Quit";
    let footer_text = match &app.notice {
        Some(notice) => format!("{notice}  |  {keys}"),
        None => keys.to_string(),
    };
    let footer = Paragraph::new(footer_text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, chunks[2]);
}
