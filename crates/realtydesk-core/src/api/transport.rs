//! HTTP transport: the one place that talks to the network.
//!
//! Everything above this layer works with `ApiRequest`/`ApiResponse`, so the
//! pipeline and session logic can be driven by a scripted transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::resources::{LOGIN_PATH, REFRESH_PATH};
use super::ApiError;

/// HTTP request timeout in seconds.
/// A timed-out request fails as a network error and never triggers a refresh.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// An outbound API call, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: header::HeaderMap,
    /// Set once the request has been through 401 recovery; a second 401 is final.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: header::HeaderMap::new(),
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Login and refresh calls are never annotated with a token and never recovered.
    pub fn is_auth_endpoint(&self) -> bool {
        let path = self.path.split('?').next().unwrap_or_default();
        path.ends_with(LOGIN_PATH) || path.ends_with(REFRESH_PATH)
    }

    pub fn set_bearer(&mut self, token: &str) -> Result<(), ApiError> {
        let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::Storage("Stored access token is not a valid header value".to_string()))?;
        self.headers.insert(header::AUTHORIZATION, value);
        Ok(())
    }

    pub fn clear_bearer(&mut self) {
        self.headers.remove(header::AUTHORIZATION);
    }

    /// The bearer token currently attached, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// A received response, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Turn a non-2xx response into the matching `ApiError`.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        // Some endpoints answer 204 or an empty 200; treat that as JSON null.
        let body = if self.body.trim().is_empty() { "null" } else { &self.body };
        serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }
}

/// Sends a request and hands back the raw response.
///
/// Implementations must not interpret status codes; a 401 is an `Ok` response
/// at this layer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Production transport backed by `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(url = %url, status = status.as_u16(), "Response received");

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoint_detection() {
        assert!(ApiRequest::post("/api/v1/auth/login").is_auth_endpoint());
        assert!(ApiRequest::post("/api/v1/auth/refresh-token").is_auth_endpoint());
        assert!(!ApiRequest::post("/api/v1/auth/register").is_auth_endpoint());
        assert!(!ApiRequest::get("/api/v1/properties").is_auth_endpoint());
        assert!(!ApiRequest::get("/api/v1/properties?q=auth/login-page").is_auth_endpoint());
    }

    #[test]
    fn test_bearer_header_roundtrip() {
        let mut request = ApiRequest::get("/api/v1/leads");
        assert_eq!(request.bearer_token(), None);

        request.set_bearer("tok1").unwrap();
        assert_eq!(
            request.headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer tok1"
        );
        assert_eq!(request.bearer_token(), Some("tok1"));

        request.set_bearer("tok2").unwrap();
        assert_eq!(request.bearer_token(), Some("tok2"));

        request.clear_bearer();
        assert_eq!(request.bearer_token(), None);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let mut request = ApiRequest::get("/api/v1/leads");
        assert!(request.set_bearer("bad\ntoken").is_err());
    }

    #[test]
    fn test_response_json_and_status() {
        let ok = ApiResponse::new(StatusCode::OK, r#"{"id":"p1"}"#);
        let value: serde_json::Value = ok.json().unwrap();
        assert_eq!(value["id"], "p1");

        let empty = ApiResponse::new(StatusCode::NO_CONTENT, "");
        let value: serde_json::Value = empty.json().unwrap();
        assert!(value.is_null());

        let denied = ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        assert!(denied.error_for_status().unwrap_err().is_unauthorized());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport = ReqwestTransport::new("http://localhost:5000/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:5000");
    }
}
