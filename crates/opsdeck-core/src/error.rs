//! Error types for Opsdeck

use thiserror::Error;

/// Result type alias using Opsdeck's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Opsdeck error types with helpful messages
#[derive(Error, Debug)]
pub enum Error {
    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your connection and the backend URL.")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned HTML instead of JSON. The base URL may point at a proxy or a login page.")]
    MalformedResponse,

    /// Non-success HTTP status. Carries the server-provided message when the
    /// body had one, else the canonical status reason.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E100",
            Self::MalformedResponse => "E101",
            Self::Api { .. } => "E102",
            Self::RefreshFailed(_) => "E103",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// HTTP status of the failed request, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The expired-credential class: 401 and 403 responses, which the client
    /// recovers from via refresh-and-replay.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}
