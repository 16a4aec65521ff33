use thiserror::Error;

use super::storage::StorageError;
use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no refresh token")]
    NoRefreshToken,

    /// The remote call failed; the HTTP-layer error is kept as-is.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message for an inline form error, using the server payload when present.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AuthError::Api(e) => e.user_message(fallback),
            _ => fallback.to_string(),
        }
    }

    /// Collapse into an `ApiError` for delivery through the request pipeline.
    pub fn into_api_error(self) -> ApiError {
        match self {
            AuthError::NoRefreshToken => ApiError::SessionExpired,
            AuthError::Api(e) => e,
            AuthError::Storage(e) => ApiError::Storage(e.to_string()),
        }
    }
}
