//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: access token, refresh token and user profile persistence
//! - `SessionManager`: login, registration, token refresh and logout
//! - `SessionContext`: observable signed-in state for the application
//!
//! Tokens are never checked for expiry locally; the server's 401 is what
//! triggers a refresh (see `api::pipeline`).

pub mod context;
pub mod credentials;
pub mod error;
pub mod models;
pub mod session;
pub mod storage;

pub use context::{route_decision, RouteDecision, SessionContext, SessionState};
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use models::{split_full_name, AuthResponse, Credentials, RegisterRequest, UserProfile};
pub use session::{SessionEvent, SessionManager};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage, StorageError};
