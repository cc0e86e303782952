//! Session entity and snapshot types

use serde::{Deserialize, Serialize};

/// The authenticated user's identity record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
        }
    }

    /// Best display label: the name when known, else the raw id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Point-in-time view of the session, broadcast to watchers on every change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    /// Derived: true iff both a user and a non-empty token are present.
    /// Recomputed inside every mutation, never set on its own.
    pub authenticated: bool,
    /// Transient: true while a login or logout operation is in flight
    pub busy: bool,
}

impl Session {
    /// Recompute the derived flag. Every mutation path ends here.
    pub(crate) fn recompute(&mut self) {
        self.authenticated = self.user.is_some()
            && self
                .access_token
                .as_deref()
                .is_some_and(|token| !token.is_empty());
    }

    /// One-line state summary with the token truncated to a short preview.
    /// Tokens are never rendered whole.
    pub fn describe(&self) -> String {
        let token = match self.access_token.as_deref() {
            Some(token) if token.chars().count() > 20 => {
                format!("{}...", token.chars().take(20).collect::<String>())
            }
            Some(token) => token.to_string(),
            None => "none".to_string(),
        };
        let user = self.user.as_ref().map(|user| user.id.as_str()).unwrap_or("none");
        format!(
            "user={} authenticated={} busy={} token={}",
            user, self.authenticated, self.busy, token
        )
    }
}

/// The subset that survives restarts; the derived flag is recomputed on load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct PersistedSession {
    pub user: Option<User>,
    pub access_token: Option<String>,
}
