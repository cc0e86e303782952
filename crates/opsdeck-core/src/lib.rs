//! Opsdeck Core Library
//!
//! This crate provides the core functionality for Opsdeck, including:
//! - Session state (identity, access token, derived authentication flag)
//! - Authenticated HTTP client with single-flight token refresh
//! - Session lifecycle operations (login with auto-registration, logout)
//! - Device metadata collection for the login payload
//! - Dashboard operations (service health, redeploys)
//! - Configuration with file persistence

pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod ops;
pub mod session;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::http::ApiClient;
    pub use crate::ops::OpsService;
    pub use crate::session::{AuthService, SessionStore};
}
