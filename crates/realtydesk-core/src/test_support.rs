//! Scripted transport shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use crate::api::resources::REFRESH_PATH;
use crate::api::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::api::ApiError;

/// Records every request. Scripted replies for a path are used first, in
/// order; once a path's script runs out, requests are answered 200 when they
/// carry the accepted bearer token and 401 otherwise.
#[derive(Default)]
pub(crate) struct StubTransport {
    requests: Mutex<Vec<ApiRequest>>,
    scripted: Mutex<HashMap<String, VecDeque<Result<ApiResponse, ApiError>>>>,
    accepted_token: Mutex<Option<String>>,
    delays: HashMap<String, Duration>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every refresh call for `delay` before answering
    pub fn with_refresh_delay(self, delay: Duration) -> Self {
        self.with_delay(REFRESH_PATH, delay)
    }

    /// Hold every call to `path` for `delay` before answering
    pub fn with_delay(mut self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_string(), delay);
        self
    }

    pub fn accept_token(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn script(&self, path: &str, reply: Result<ApiResponse, ApiError>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn script_json(&self, path: &str, status: StatusCode, body: serde_json::Value) {
        self.script(path, Ok(ApiResponse::new(status, body.to_string())));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    /// Bearer tokens seen on requests to `path`, in arrival order
    pub fn tokens_sent_to(&self, path: &str) -> Vec<Option<String>> {
        self.requests_to(path)
            .iter()
            .map(|r| r.bearer_token().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delays.get(&request.path) {
            tokio::time::sleep(*delay).await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&request.path)
            .and_then(|queue| queue.pop_front());
        if let Some(reply) = scripted {
            return reply;
        }

        let accepted = self.accepted_token.lock().unwrap().clone();
        match (accepted, request.bearer_token()) {
            (Some(accepted), Some(sent)) if accepted == sent => Ok(ApiResponse::new(
                StatusCode::OK,
                json!({"path": request.path, "token": sent}).to_string(),
            )),
            _ => Ok(ApiResponse::new(
                StatusCode::UNAUTHORIZED,
                json!({"message": "Unauthorized"}).to_string(),
            )),
        }
    }
}
