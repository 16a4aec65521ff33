use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::resources::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::api::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::api::ApiError;

use super::credentials::CredentialStore;
use super::error::AuthError;
use super::models::{parse_token_response, AuthResponse, Credentials, LoginResponse, RegisterRequest, UserProfile};

/// Capacity of the session event channel; slow subscribers miss old events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Notifications for the hosting application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login or registration stored a new session.
    LoggedIn(Option<UserProfile>),
    /// The session ended; the host should navigate to its login screen.
    Terminated,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// The authentication protocol: turns credentials into a stored session.
///
/// Auth calls go straight to the transport, never through the request
/// pipeline, so a failing refresh can not recurse into another refresh.
pub struct SessionManager {
    transport: Arc<dyn HttpTransport>,
    store: CredentialStore,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn HttpTransport>, store: CredentialStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            store,
            events,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Subscribe to login and termination events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn post_unauthenticated<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest::post(path).json(body)?;
        self.transport.execute(&request).await?.error_for_status()
    }

    /// Log in with email and password, persisting the returned session.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        debug!(email = %credentials.email, "Logging in");
        let response = self.post_unauthenticated(LOGIN_PATH, credentials).await?;
        let login: LoginResponse = response.json()?;
        let bundle = login.into_auth_response();

        self.store.save_bundle(&bundle)?;
        info!(user_id = ?bundle.user.as_ref().map(|u| &u.id), "Login successful");
        self.emit(SessionEvent::LoggedIn(bundle.user.clone()));
        Ok(bundle)
    }

    /// Register a new account. The server's `user` is stored as returned.
    pub async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        debug!(email = %data.email, "Registering");
        let response = self.post_unauthenticated(REGISTER_PATH, data).await?;
        let bundle: AuthResponse = response.json()?;

        self.store.save_bundle(&bundle)?;
        info!(has_user = bundle.user.is_some(), "Registration successful");
        self.emit(SessionEvent::LoggedIn(bundle.user.clone()));
        Ok(bundle)
    }

    /// Exchange the stored refresh token for a new bundle.
    ///
    /// When the response carries no user, the cached profile is kept.
    pub async fn refresh_token(&self) -> Result<AuthResponse, AuthError> {
        let refresh_token = self.store.refresh_token().ok_or(AuthError::NoRefreshToken)?;

        debug!("Refreshing access token");
        let response = self
            .post_unauthenticated(REFRESH_PATH, &RefreshRequest {
                refresh_token: &refresh_token,
            })
            .await?;
        let value: serde_json::Value = response.json()?;
        let mut bundle = parse_token_response(value)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))?;

        if bundle.user.is_none() {
            bundle.user = self.store.user();
        }
        self.store.save_bundle(&bundle)?;
        info!("Access token refreshed");
        Ok(bundle)
    }

    /// Clear the stored session and tell the host to go to its login screen.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        info!("Session terminated");
        self.emit(SessionEvent::Terminated);
    }

    /// An access token is present. Expiry is the server's call.
    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.user()
    }

    /// The cached user if there is a usable session, surfacing storage failures.
    pub fn restore(&self) -> Result<Option<UserProfile>, AuthError> {
        let (token, user) = self.store.try_load()?;
        Ok(token.and(user))
    }
}
