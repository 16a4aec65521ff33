//! Core library for the RealtyDesk CRM client.
//!
//! This crate owns the authentication session lifecycle and the authorized
//! HTTP request pipeline that every resource call goes through:
//!
//! - `auth`: credential storage, the session manager and the session context
//! - `api`: transport, the token-refreshing request pipeline and a typed client
//! - `config`: persisted application configuration

pub mod api;
pub mod auth;
pub mod config;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, RequestPipeline};
pub use auth::{CredentialStore, SessionContext, SessionManager, SessionState};
pub use config::Config;
