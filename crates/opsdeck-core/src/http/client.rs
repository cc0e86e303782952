//! Authenticated HTTP client for the ops backend
//!
//! Wraps reqwest with the backend's auth lifecycle:
//! - raw access token injected on every call except the auth endpoints
//! - HTML responses rejected as malformed even on 2xx
//! - 401/403 recovered through a single-flight token refresh, with
//!   concurrent failures queued and replayed once the new token lands
//!
//! A request that still fails after its replay, or whose refresh fails,
//! clears the session; presentation layers observe the cleared snapshot
//! and route back to login.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_BASE_URL;
use crate::error::{Error, Result};
use crate::session::SessionStore;

use super::refresh::{RefreshCoordinator, RefreshOutcome, RefreshTicket};
use super::types::{ApiRequest, AuthResponse, Method};

/// Default request timeout, covering the backend's slowest redeploy path
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Authenticated client for one backend deployment.
///
/// Cheap to share behind an `Arc`; the base URL can be swapped at runtime
/// when the user switches deployments before logging in.
pub struct ApiClient {
    http: HttpClient,
    base_url: RwLock<String>,
    session: Arc<SessionStore>,
    refresh: RefreshCoordinator,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url())
            .field("refreshing", &self.refresh.is_refreshing())
            .finish()
    }
}

/// Builder for creating an [`ApiClient`]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    session: Option<Arc<SessionStore>>,
    timeout_secs: Option<u64>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            session: None,
            timeout_secs: None,
        }
    }

    /// Set the backend base URL (defaults to the primary deployment)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the session store the client reads tokens from and clears on
    /// unrecoverable auth failures. Required.
    pub fn session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the global request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the ApiClient
    pub fn build(self) -> Result<ApiClient> {
        let session = self
            .session
            .ok_or_else(|| Error::Config("a session store is required".to_string()))?;

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(
                self.timeout_secs.unwrap_or(REQUEST_TIMEOUT_SECS),
            ))
            .build()?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(ApiClient {
            http,
            base_url: RwLock::new(base_url),
            session,
            refresh: RefreshCoordinator::new(),
        })
    }
}

impl ApiClient {
    /// Create a client for `base_url` backed by `session`
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Result<Self> {
        Self::builder().base_url(base_url).session(session).build()
    }

    /// Create a new builder for ApiClient
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// The deployment the client currently targets
    pub fn base_url(&self) -> String {
        self.base_url.read().unwrap().clone()
    }

    /// Point the client at a different backend deployment.
    ///
    /// Only requests issued afterwards are affected; anything already in
    /// flight completes against the previous target.
    pub fn set_base_url(&self, url: impl Into<String>) {
        let url = url.into().trim_end_matches('/').to_string();
        info!(base_url = %url, "switching backend");
        *self.base_url.write().unwrap() = url;
    }

    /// Probe the configured backend without entering the auth pipeline.
    ///
    /// Any HTTP response counts as reachable, auth rejections included; an
    /// HTML payload is still reported as malformed since it means the URL
    /// points at a proxy or a login wall. No token is attached and no
    /// refresh can be triggered, so probing never disturbs the session.
    pub async fn probe(&self) -> Result<()> {
        let url = format!("{}/v2/service_status", self.base_url());
        let response = self.http.get(&url).send().await?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if content_type.contains("text/html") {
            return Err(Error::MalformedResponse);
        }
        Ok(())
    }

    /// GET `path` through the full auth pipeline
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::get(path)).await
    }

    /// POST `path` with a JSON body through the full auth pipeline
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        self.execute(ApiRequest::post(path).with_body(body)).await
    }

    /// Issue a request through the full auth pipeline and deserialize the
    /// response body.
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let value = self.execute_raw(request).await?;
        serde_json::from_value(value)
            .map_err(|err| Error::Other(format!("Unexpected response shape: {err}")))
    }

    /// The interception pipeline: dispatch, then recover expired tokens via
    /// refresh-and-replay.
    ///
    /// `retried` is the per-request one-shot marker: a request that already
    /// replayed once and fails 401/403 again does not get a second refresh;
    /// it drops the session instead. Queued followers replay unmarked, as
    /// their expiry was arbitrated by a cycle another request led.
    async fn execute_raw(&self, request: ApiRequest) -> Result<Value> {
        let mut retried = false;
        let mut token_override: Option<String> = None;

        loop {
            let err = match self.dispatch(&request, token_override.as_deref()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            // Refresh never applies to the auth endpoints themselves, nor to
            // anything but the expired-credential class.
            if request.is_auth_endpoint() || !err.is_auth_expired() {
                return Err(err);
            }

            if retried {
                warn!(path = %request.path, "still rejected after refresh, clearing session");
                self.session.clear();
                return Err(err);
            }

            match self.refresh.begin() {
                RefreshTicket::Follower(outcome) => {
                    debug!(path = %request.path, "refresh in flight, queueing request");
                    match outcome.await {
                        Ok(RefreshOutcome::Refreshed(token)) => {
                            token_override = token;
                        }
                        Ok(RefreshOutcome::Failed(message)) => {
                            return Err(Error::RefreshFailed(message));
                        }
                        Err(_) => {
                            return Err(Error::RefreshFailed(
                                "refresh cycle ended without an outcome".to_string(),
                            ));
                        }
                    }
                }
                RefreshTicket::Leader => match self.refresh_access_token().await {
                    Ok(token) => {
                        self.refresh
                            .finish(RefreshOutcome::Refreshed(token.clone()));
                        retried = true;
                        token_override = token;
                    }
                    Err(refresh_err) => {
                        let message = refresh_err.to_string();
                        warn!(error = %message, "token refresh failed, clearing session");
                        self.refresh.finish(RefreshOutcome::Failed(message.clone()));
                        self.session.clear();
                        return Err(Error::RefreshFailed(message));
                    }
                },
            }
        }
    }

    /// One transport round trip: build, send, classify.
    ///
    /// `token_override` carries the token a refresh cycle just produced;
    /// without it the session's current token is attached (outbound rule).
    async fn dispatch(&self, request: &ApiRequest, token_override: Option<&str>) -> Result<Value> {
        let url = format!("{}{}", self.base_url(), request.path);

        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        // Outbound interception: the raw token value, never on the auth
        // endpoints themselves.
        if !request.is_auth_endpoint() {
            let token = match token_override {
                Some(token) => Some(token.to_string()),
                None => self.session.access_token(),
            };
            if let Some(token) = token.filter(|t| !t.is_empty()) {
                builder = builder.header(header::AUTHORIZATION, token);
            }
        }

        debug!(method = ?request.method, path = %request.path, "dispatching request");

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        // A markup payload on a success status means the base URL points at
        // a proxy or a login wall, not the API.
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if content_type.contains("text/html") {
            warn!(path = %request.path, "got an HTML response from the backend");
            return Err(Error::MalformedResponse);
        }

        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|err| Error::Other(format!("Unexpected response shape: {err}")))
    }

    /// The single refresh call of a cycle (leader only).
    ///
    /// Stores the new token into the session when the response carries one;
    /// a tokenless success is passed through as `None` rather than treated
    /// as a failure.
    async fn refresh_access_token(&self) -> Result<Option<String>> {
        info!("access token rejected, refreshing");

        let request = ApiRequest::post("/v2/users/refresh_token").with_body(serde_json::json!({}));
        let value = self.dispatch(&request, None).await?;
        let auth: AuthResponse = serde_json::from_value(value).unwrap_or_default();

        let token = auth.access_token().map(str::to_string);
        match &token {
            Some(token) => self.session.set_access_token(Some(token.clone())),
            None => warn!("refresh response carried no access token"),
        }
        Ok(token)
    }
}

/// Most specific message available: the body's `message` field, else the
/// canonical status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
