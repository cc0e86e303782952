//! Session state and lifecycle
//!
//! This module provides:
//! - `Session`/`User`: the authentication context and its derived flag
//! - `SessionStore`: the process-wide state, persisted and observable
//! - `AuthService`: login (with auto-registration) and logout

mod auth;
mod state;
mod store;

pub use auth::AuthService;
pub use state::{Session, User};
pub use store::SessionStore;
