//! Authenticated HTTP plumbing for the ops backend
//!
//! This module provides:
//! - `ApiClient`: reqwest wrapper with raw-token injection and the
//!   single-flight refresh-and-replay protocol
//! - `RefreshCoordinator`: the idle/refreshing state and its waiter queue
//! - Wire types shared by every endpoint

mod client;
mod refresh;
mod types;

pub use client::{ApiClient, ApiClientBuilder};
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshTicket};
pub use types::{ApiEnvelope, ApiRequest, AuthData, AuthResponse, Method, WireUser};
