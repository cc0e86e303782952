//! Client metadata sent with the login payload
//!
//! The backend's device record was designed for browsers; a terminal client
//! reports its closest analogs in the same wire fields. Every lookup
//! degrades to a sentinel value rather than failing the login.

use std::env;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;

/// Sentinel for fields the environment does not reveal
const UNKNOWN: &str = "Unknown";

/// Primary and fallback public-IP providers with their lookup budgets
const IP_PROVIDERS: &[(&str, u64)] = &[
    ("https://api.ipify.org/?format=json", 5),
    ("https://api64.ipify.org/?format=json", 3),
];

/// Client metadata attached to login and register calls.
///
/// Field names follow the backend contract (`screenResolution`, `isMobile`,
/// `ipAddress`); the `browser` field carries the terminal program.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub os: String,
    pub browser: String,
    pub screen_resolution: String,
    pub is_mobile: bool,
    pub ip_address: String,
}

impl DeviceInfo {
    /// Gather client metadata.
    ///
    /// Never fails: unavailable fields report "Unknown". The public-IP
    /// lookup is the only network call and has its own short timeouts.
    pub async fn collect() -> Self {
        Self {
            os: operating_system().to_string(),
            browser: terminal_program(),
            screen_resolution: screen_resolution(),
            is_mobile: is_mobile(),
            ip_address: public_ip().await,
        }
    }
}

/// Human-readable operating system name
pub fn operating_system() -> &'static str {
    match env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        "android" => "Android",
        "ios" => "iOS",
        "freebsd" | "openbsd" | "netbsd" => "BSD",
        _ => UNKNOWN,
    }
}

/// The user-agent analog for a terminal client
pub fn terminal_program() -> String {
    env::var("TERM_PROGRAM")
        .or_else(|_| env::var("TERM"))
        .unwrap_or_else(|_| UNKNOWN.to_string())
}

/// Terminal dimensions as "ColsxRows"
pub fn screen_resolution() -> String {
    match crossterm::terminal::size() {
        Ok((cols, rows)) => format!("{cols}x{rows}"),
        Err(_) => UNKNOWN.to_string(),
    }
}

pub fn is_mobile() -> bool {
    matches!(env::consts::OS, "android" | "ios")
}

/// Public address lookup across the configured providers, in order.
///
/// Each provider gets its own budget; all failures collapse to "Unknown".
pub async fn public_ip() -> String {
    for (url, secs) in IP_PROVIDERS {
        if let Some(ip) = lookup_ip(url, Duration::from_secs(*secs)).await {
            return ip;
        }
    }
    UNKNOWN.to_string()
}

async fn lookup_ip(url: &str, budget: Duration) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct IpPayload {
        ip: Option<String>,
    }

    let request = async {
        let response = reqwest::get(url).await.ok()?;
        let payload: IpPayload = response.json().await.ok()?;
        payload.ip
    };

    match timeout(budget, request).await {
        Ok(ip @ Some(_)) => ip,
        Ok(None) => None,
        Err(_) => {
            debug!(url, "public IP lookup timed out");
            None
        }
    }
}
