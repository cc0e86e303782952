//! Dashboard operations - downstream service health and redeploys

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::http::{ApiClient, ApiEnvelope, ApiRequest};

/// Branch redeploys default to, per the deployment pipeline
pub const DEFAULT_BRANCH: &str = "dev";

/// Reported health of a downstream service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceState {
    Up,
    Down,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }

    /// Only DOWN services offer the redeploy action
    pub fn is_down(&self) -> bool {
        matches!(self, Self::Down)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health record for one downstream service, as reported by the backend.
/// Never mutated locally; the whole list is refetched on demand.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service_name: String,
    pub status: ServiceState,
    pub updated_at: String,
}

impl ServiceStatus {
    /// Human timestamp; falls back to the raw value when it fails to parse
    pub fn updated_at_display(&self) -> String {
        DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|parsed| {
                parsed
                    .with_timezone(&Utc)
                    .format("%b %e, %Y %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|_| self.updated_at.clone())
    }
}

/// Service health and redeploy calls over the authenticated client
pub struct OpsService {
    client: Arc<ApiClient>,
}

impl OpsService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Current health of every downstream service
    pub async fn service_status(&self) -> Result<Vec<ServiceStatus>> {
        let envelope: ApiEnvelope<Vec<ServiceStatus>> =
            self.client.get("/v2/service_status").await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Ask the backend to redeploy `service` from `branch`; returns the
    /// server's acknowledgement message.
    pub async fn redeploy(&self, service: &str, branch: &str) -> Result<String> {
        info!(service, branch, "requesting redeploy");

        let request = ApiRequest::post("/v2/custom/redeploy")
            .with_body(json!({ "service": service, "branch": branch }));
        let envelope: ApiEnvelope<serde_json::Value> = self.client.execute(request).await?;

        Ok(envelope
            .message
            .unwrap_or_else(|| "Redeploy initiated successfully".to_string()))
    }
}
