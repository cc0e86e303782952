//! Wire types for the ops backend
//!
//! Every endpoint answers with the `{success, message, data}` envelope.
//! Auth endpoints historically returned the access token either nested in
//! `data` or at the top level, so extraction checks both in that order.

use serde::Deserialize;
use serde_json::Value;

/// The endpoints that never carry a token and never trigger a refresh
const AUTH_ENDPOINTS: [&str; 4] = [
    "/v2/users/login",
    "/v2/users/register",
    "/v2/users/logout",
    "/v2/users/refresh_token",
];

/// Success envelope shared by every backend endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// User fields embedded in auth responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireUser {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Payload of login, register and refresh responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthData {
    pub access_token: Option<String>,
    pub user: Option<WireUser>,
}

/// Login/register/refresh response body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub access_token: Option<String>,
    pub data: Option<AuthData>,
}

impl AuthResponse {
    /// Access token from the nested payload first, then the top level
    pub fn access_token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.access_token.as_deref())
            .or(self.access_token.as_deref())
    }

    /// User record embedded in the response, if any
    pub fn user(&self) -> Option<&WireUser> {
        self.data.as_ref().and_then(|data| data.user.as_ref())
    }
}

/// HTTP method of an [`ApiRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Reissuable request descriptor.
///
/// The dispatch pipeline passes this around (with an attempt counter held
/// by the caller) instead of mutating an in-flight request, so a request
/// can be replayed after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// True for the four endpoints that are exempt from token injection
    /// and from the refresh protocol.
    pub fn is_auth_endpoint(&self) -> bool {
        AUTH_ENDPOINTS
            .iter()
            .any(|endpoint| self.path.starts_with(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_extraction_prefers_nested_payload() {
        let response: AuthResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "access_token": "top",
            "data": { "access_token": "nested" }
        }))
        .unwrap();
        assert_eq!(response.access_token(), Some("nested"));
    }

    #[test]
    fn test_token_extraction_falls_back_to_top_level() {
        let response: AuthResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "access_token": "top",
            "data": { "user": { "id": "u1" } }
        }))
        .unwrap();
        assert_eq!(response.access_token(), Some("top"));
        assert_eq!(response.user().and_then(|u| u.id.as_deref()), Some("u1"));
    }

    #[test]
    fn test_token_extraction_handles_bare_body() {
        let response: AuthResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(response.access_token(), None);
        assert!(response.user().is_none());
    }

    #[test]
    fn test_auth_endpoints_are_exempt() {
        assert!(ApiRequest::post("/v2/users/login").is_auth_endpoint());
        assert!(ApiRequest::post("/v2/users/register").is_auth_endpoint());
        assert!(ApiRequest::post("/v2/users/logout").is_auth_endpoint());
        assert!(ApiRequest::post("/v2/users/refresh_token").is_auth_endpoint());
        assert!(!ApiRequest::get("/v2/service_status").is_auth_endpoint());
        assert!(!ApiRequest::get("/v2/users/details").is_auth_endpoint());
        assert!(!ApiRequest::post("/v2/custom/redeploy").is_auth_endpoint());
    }

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let envelope: ApiEnvelope<Vec<String>> =
            serde_json::from_value(serde_json::json!({ "success": true })).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
    }
}
