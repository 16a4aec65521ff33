use thiserror::Error;

/// Errors surfaced by the transport, the request pipeline and the API client.
///
/// `Clone` so a single refresh outcome can be handed to every request that
/// was parked while the refresh was in flight. Response bodies are kept whole
/// and only cut short when displayed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized { body: String },

    #[error("Access denied: {}", truncate_body(.0))]
    AccessDenied(String),

    #[error("Resource not found: {}", truncate_body(.0))]
    NotFound(String),

    #[error("Bad request (status {status}): {}", truncate_body(.body))]
    BadRequest { status: u16, body: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {}", truncate_body(.0))]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(Box<ApiError>),

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Credential storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Payload fields checked, in order, for a server-provided error message
const MESSAGE_FIELDS: [&str; 3] = ["message", "error", "title"];

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

impl ApiError {
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = body.to_string();
        match status.as_u16() {
            401 => ApiError::Unauthorized { body },
            403 => ApiError::AccessDenied(body),
            404 => ApiError::NotFound(body),
            429 => ApiError::RateLimited,
            400..=499 => ApiError::BadRequest {
                status: status.as_u16(),
                body,
            },
            500..=599 => ApiError::ServerError(body),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncate_body(&body))),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::BadRequest { status, .. } => Some(*status),
            ApiError::RefreshFailed(inner) => inner.status(),
            _ => None,
        }
    }

    /// Response body carried by this error, if any.
    fn body(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { body } | ApiError::BadRequest { body, .. } => Some(body),
            ApiError::AccessDenied(body)
            | ApiError::NotFound(body)
            | ApiError::ServerError(body) => Some(body),
            ApiError::RefreshFailed(inner) => inner.body(),
            _ => None,
        }
    }

    /// Message suitable for showing inline next to a form.
    ///
    /// Uses the server's JSON error payload when it carries one, otherwise
    /// `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.body()
            .and_then(|body| serde_json::from_str::<serde_json::Value>(body).ok())
            .and_then(|payload| {
                MESSAGE_FIELDS.iter().find_map(|field| {
                    payload
                        .get(field)
                        .and_then(|v| v.as_str())
                        .filter(|s| !s.trim().is_empty())
                        .map(str::to_string)
                })
            })
            .unwrap_or_else(|| fallback.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
