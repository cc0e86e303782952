//! Session lifecycle operations: login and logout
//!
//! Login auto-registers unknown user ids: a 404/400 from the login endpoint
//! triggers exactly one registration attempt with a synthesized email. The
//! access token and user record land in the session store; the HTTP client
//! picks the token up from there on subsequent calls.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use crate::http::{ApiClient, ApiEnvelope, ApiRequest, AuthResponse, WireUser};

use super::state::User;
use super::store::SessionStore;

/// Fallback when neither the server nor the transport provides a message
const LOGIN_FALLBACK_ERROR: &str = "Authentication failed";

/// Login and logout over the authenticated client
pub struct AuthService {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
    fixed_device: Option<DeviceInfo>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self {
            client,
            session,
            fixed_device: None,
        }
    }

    /// Use fixed device metadata instead of probing the environment
    pub fn with_device_info(mut self, device: DeviceInfo) -> Self {
        self.fixed_device = Some(device);
        self
    }

    /// Log in with a plain user id, registering it on first use.
    ///
    /// The busy flag is held for the whole operation. On failure the token
    /// is cleared and the error carries the most specific message available
    /// (server message, else transport message, else a fixed fallback).
    pub async fn login(&self, user_id: &str) -> Result<User> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidInput("user id must not be empty".to_string()));
        }

        self.session.set_busy(true);

        match self.login_inner(user_id).await {
            Ok(user) => {
                self.session.set_busy(false);
                info!(user = %user.id, "login succeeded");
                Ok(user)
            }
            Err(err) => {
                self.session.set_access_token(None);
                self.session.set_busy(false);
                Err(normalize_login_error(err))
            }
        }
    }

    async fn login_inner(&self, user_id: &str) -> Result<User> {
        // Device metadata never aborts a login; lookups degrade field by
        // field to "Unknown".
        let device = match &self.fixed_device {
            Some(device) => device.clone(),
            None => DeviceInfo::collect().await,
        };

        let login = ApiRequest::post("/v2/users/login")
            .with_query("userId", user_id)
            .with_body(json!({ "device": device }));

        let response: AuthResponse = match self.client.execute(login).await {
            Ok(response) => response,
            // Unknown or malformed user id: fall back to a single
            // registration attempt with the same id.
            Err(err) if is_unknown_user(&err) => {
                info!(user = %user_id, "user not found, auto-registering");
                let register = ApiRequest::post("/v2/users/register")
                    .with_query("userId", user_id)
                    .with_body(json!({
                        "name": user_id,
                        "email": format!("{user_id}@auto-registered.local"),
                        "device": device,
                    }));
                self.client.execute(register).await?
            }
            Err(err) => return Err(err),
        };

        if let Some(token) = response.access_token() {
            self.session.set_access_token(Some(token.to_string()));
        }

        let user = self.fetch_user_details(user_id, &response).await;
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Full details from the backend, falling back to whatever the auth
    /// response embedded, then to the supplied id.
    async fn fetch_user_details(&self, user_id: &str, auth: &AuthResponse) -> User {
        match self
            .client
            .get::<ApiEnvelope<WireUser>>("/v2/users/details")
            .await
        {
            Ok(envelope) if envelope.success && envelope.data.is_some() => {
                let data = envelope.data.unwrap_or_default();
                User {
                    id: data.id.unwrap_or_else(|| user_id.to_string()),
                    email: data.email,
                    name: data.name.or_else(|| Some(user_id.to_string())),
                }
            }
            Ok(_) | Err(_) => {
                let embedded = auth.user().cloned().unwrap_or_default();
                User {
                    id: embedded.id.unwrap_or_else(|| user_id.to_string()),
                    email: embedded.email,
                    name: embedded.name.or_else(|| Some(user_id.to_string())),
                }
            }
        }
    }

    /// Log out. The remote call is best-effort; local state always clears.
    pub async fn logout(&self) {
        self.session.set_busy(true);
        if self
            .session
            .access_token()
            .is_some_and(|token| !token.is_empty())
        {
            let request = ApiRequest::post("/v2/users/logout");
            if let Err(err) = self.client.execute::<serde_json::Value>(request).await {
                warn!(%err, "logout call failed, clearing local session anyway");
            }
        }
        self.session.clear();
    }
}

fn is_unknown_user(err: &Error) -> bool {
    matches!(err, Error::Api { status: 404 | 400, .. })
}

/// Server message and transport message pass through; anything else
/// collapses to the fixed fallback.
fn normalize_login_error(err: Error) -> Error {
    match err {
        err @ (Error::Api { .. }
        | Error::Network(_)
        | Error::MalformedResponse
        | Error::RefreshFailed(_)
        | Error::InvalidInput(_)) => err,
        _ => Error::Other(LOGIN_FALLBACK_ERROR.to_string()),
    }
}
