//! Opsdeck CLI - service health and redeploys from the terminal

use std::sync::Arc;

use clap::{Parser, Subcommand};
use opsdeck_core::config::{Config, KNOWN_BACKENDS};
use opsdeck_core::device::DeviceInfo;
use opsdeck_core::http::ApiClient;
use opsdeck_core::ops::{DEFAULT_BRANCH, OpsService};
use opsdeck_core::session::{AuthService, SessionStore};

#[derive(Parser)]
#[command(name = "opsdeck")]
#[command(author, version, about = "Service health and redeploys from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides and replaces the configured deployment)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in (registers the user id on first use)
    Login {
        /// User id to log in with
        user_id: String,
    },

    /// Log out and clear the local session
    Logout,

    /// Show downstream service health
    Status,

    /// Redeploy a service
    Redeploy {
        /// Service name, as shown by `opsdeck status`
        service: String,
        /// Branch to deploy from
        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch: String,
    },

    /// List known backend deployments
    Backends,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run a health check on the local setup
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("opsdeck=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(backend) = &cli.backend {
        // The chosen deployment is remembered for future runs
        config.backend.base_url = backend.trim_end_matches('/').to_string();
        config.save()?;
    }

    let session = Arc::new(SessionStore::load(Config::session_path()?));
    let client = Arc::new(
        ApiClient::builder()
            .base_url(&config.backend.base_url)
            .timeout_secs(config.http.timeout_secs)
            .session(session.clone())
            .build()?,
    );

    match cli.command {
        Commands::Login { user_id } => cmd_login(&client, &session, &user_id, cli.quiet).await,
        Commands::Logout => cmd_logout(&client, &session, cli.quiet).await,
        Commands::Status => cmd_status(&client, &session).await,
        Commands::Redeploy { service, branch } => {
            cmd_redeploy(&client, &session, &service, &branch).await
        }
        Commands::Backends => cmd_backends(&config),
        Commands::Config { action } => cmd_config(action),
        Commands::Doctor => cmd_doctor(&config, &client, &session).await,
    }
}

async fn cmd_login(
    client: &Arc<ApiClient>,
    session: &Arc<SessionStore>,
    user_id: &str,
    quiet: bool,
) -> anyhow::Result<()> {
    let auth = AuthService::new(client.clone(), session.clone());
    let user = auth.login(user_id).await?;
    if !quiet {
        println!("Logged in as {} ({})", user.display_name(), user.id);
        println!("Backend: {}", client.base_url());
    }
    Ok(())
}

async fn cmd_logout(
    client: &Arc<ApiClient>,
    session: &Arc<SessionStore>,
    quiet: bool,
) -> anyhow::Result<()> {
    let auth = AuthService::new(client.clone(), session.clone());
    auth.logout().await;
    if !quiet {
        println!("Logged out.");
    }
    Ok(())
}

async fn cmd_status(client: &Arc<ApiClient>, session: &Arc<SessionStore>) -> anyhow::Result<()> {
    require_login(session)?;

    let ops = OpsService::new(client.clone());
    let services = ops.service_status().await?;

    if services.is_empty() {
        println!("No services reported.");
        return Ok(());
    }

    println!("{:<32} {:<8} {}", "SERVICE", "STATUS", "UPDATED");
    for service in &services {
        println!(
            "{:<32} {:<8} {}",
            service.service_name,
            service.status,
            service.updated_at_display()
        );
    }
    Ok(())
}

async fn cmd_redeploy(
    client: &Arc<ApiClient>,
    session: &Arc<SessionStore>,
    service: &str,
    branch: &str,
) -> anyhow::Result<()> {
    require_login(session)?;

    let ops = OpsService::new(client.clone());
    let message = ops.redeploy(service, branch).await?;
    println!("{message}");
    Ok(())
}

fn cmd_backends(config: &Config) -> anyhow::Result<()> {
    for (label, url) in KNOWN_BACKENDS {
        let marker = if *url == config.backend.base_url { "*" } else { " " };
        println!("{marker} {label:<12} {url}");
    }
    if Config::backend_label(&config.backend.base_url).is_none() {
        println!("* custom       {}", config.backend.base_url);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("{key} = {value}");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list() {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(
    config: &Config,
    client: &Arc<ApiClient>,
    session: &Arc<SessionStore>,
) -> anyhow::Result<()> {
    println!("Opsdeck Health Check");
    println!("====================");
    println!();

    // Check config file location
    let config_path = Config::config_path()?;
    if config_path.exists() {
        println!("[OK] Config file: {}", config_path.display());
    } else {
        println!("[--] Config file: {} (using defaults)", config_path.display());
    }

    // Check chosen deployment
    match Config::backend_label(&config.backend.base_url) {
        Some(label) => println!("[OK] Backend: {} ({label})", config.backend.base_url),
        None => println!("[--] Backend: {} (custom)", config.backend.base_url),
    }

    // Check backend reachability; an auth rejection still proves the host
    // answers, and the probe never touches the stored session
    match client.probe().await {
        Ok(()) => println!("[OK] Reachability: backend answered"),
        Err(err) => println!("[!!] Reachability: {err}"),
    }

    let device = DeviceInfo::collect().await;
    println!(
        "[OK] Device: {} / {} / {}",
        device.os, device.browser, device.screen_resolution
    );
    println!("     Public IP: {}", device.ip_address);

    let snapshot = session.snapshot();
    if snapshot.authenticated {
        println!("[OK] Session: {}", snapshot.describe());
    } else {
        println!("[--] Session: {}", snapshot.describe());
    }

    Ok(())
}

fn require_login(session: &Arc<SessionStore>) -> anyhow::Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!("Not logged in. Run `opsdeck login <user id>` first.");
    }
    Ok(())
}
