//! Reactive "who is logged in" view for the rest of the application.
//!
//! `SessionContext` starts in `Loading`, settles once `initialize` has looked
//! at the stored session, and afterwards only changes through its own
//! `login`, `register` and `logout`. A silent token refresh does not touch it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::error::AuthError;
use super::models::{AuthResponse, Credentials, RegisterRequest, UserProfile};
use super::session::SessionManager;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Loading,
    /// Signed in. The user can be missing after a registration whose
    /// response carried none.
    Authenticated(Option<UserProfile>),
    Unauthenticated,
}

impl SessionState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Authenticated(user) => user.as_ref(),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// What a guarded view should do for a given session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Still checking the stored session; show a waiting state
    Wait,
    RedirectToLogin,
    /// Render the protected content
    Render,
}

pub fn route_decision(state: &SessionState) -> RouteDecision {
    match state {
        SessionState::Loading => RouteDecision::Wait,
        SessionState::Unauthenticated => RouteDecision::RedirectToLogin,
        SessionState::Authenticated(_) => RouteDecision::Render,
    }
}

pub struct SessionContext {
    session: Arc<SessionManager>,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn new(session: Arc<SessionManager>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self { session, state }
    }

    /// Create and immediately check the stored session
    pub fn initialized(session: Arc<SessionManager>) -> Self {
        let context = Self::new(session);
        context.initialize();
        context
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn set(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Settle the initial state from the stored session.
    ///
    /// A storage failure here counts as logged out, and the session is
    /// cleared so no half-written bundle lingers.
    pub fn initialize(&self) {
        let next = match self.session.restore() {
            Ok(Some(user)) => {
                debug!(user_id = %user.id, "Restored stored session");
                SessionState::Authenticated(Some(user))
            }
            Ok(None) => SessionState::Unauthenticated,
            Err(e) => {
                warn!(error = %e, "Failed to restore session, logging out");
                self.session.logout();
                SessionState::Unauthenticated
            }
        };
        self.set(next);
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn route_decision(&self) -> RouteDecision {
        route_decision(&self.state.borrow())
    }

    /// Log in. On failure the state is left alone and the error returned.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, AuthError> {
        let response = self.session.login(credentials).await?;
        self.set(SessionState::Authenticated(response.user.clone()));
        Ok(response)
    }

    pub async fn register(&self, data: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let response = self.session.register(data).await?;
        self.set(SessionState::Authenticated(response.user.clone()));
        Ok(response)
    }

    pub fn logout(&self) {
        self.session.logout();
        self.set(SessionState::Unauthenticated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::resources::{LOGIN_PATH, REGISTER_PATH};
    use crate::auth::storage::{MemoryStorage, Storage, StorageError};
    use crate::auth::CredentialStore;
    use crate::test_support::StubTransport;
    use reqwest::StatusCode;
    use serde_json::json;

    fn context_with(storage: Arc<dyn Storage>, transport: &Arc<StubTransport>) -> SessionContext {
        let session = Arc::new(SessionManager::new(transport.clone(), CredentialStore::new(storage)));
        SessionContext::new(session)
    }

    fn sample_user() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            full_name: "Ana Gómez".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Gómez".to_string(),
            role: 2,
            organization_id: Some("org1".to_string()),
            is_active: true,
        }
    }

    /// Access token readable, user read fails
    struct FlakyStorage {
        inner: MemoryStorage,
    }

    impl Storage for FlakyStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if key == "user" {
                return Err(StorageError::NoDataDir);
            }
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_starts_loading() {
        let transport = Arc::new(StubTransport::new());
        let context = context_with(Arc::new(MemoryStorage::new()), &transport);
        assert_eq!(context.state(), SessionState::Loading);
        assert_eq!(context.route_decision(), RouteDecision::Wait);
    }

    #[test]
    fn test_initialize_with_stored_session() {
        let transport = Arc::new(StubTransport::new());
        let context = context_with(Arc::new(MemoryStorage::new()), &transport);
        let store = context.session().store();
        store.set_access_token("tok1").unwrap();
        store.set_user(&sample_user()).unwrap();

        context.initialize();
        assert_eq!(context.state(), SessionState::Authenticated(Some(sample_user())));
        assert_eq!(context.route_decision(), RouteDecision::Render);
    }

    #[test]
    fn test_initialize_partial_bundle_is_unauthenticated() {
        let transport = Arc::new(StubTransport::new());
        let context = context_with(Arc::new(MemoryStorage::new()), &transport);
        context.session().store().set_user(&sample_user()).unwrap();

        context.initialize();
        assert_eq!(context.state(), SessionState::Unauthenticated);
        assert_eq!(context.route_decision(), RouteDecision::RedirectToLogin);
    }

    #[test]
    fn test_initialize_failure_logs_out() {
        let transport = Arc::new(StubTransport::new());
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
        });
        storage.set("access_token", "tok1").unwrap();
        let context = context_with(storage.clone(), &transport);
        let mut events = context.session().subscribe();

        context.initialize();
        assert_eq!(context.state(), SessionState::Unauthenticated);
        assert!(storage.inner.is_empty());
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_login_transitions_and_notifies_watchers() {
        let transport = Arc::new(StubTransport::new());
        transport.script_json(
            LOGIN_PATH,
            StatusCode::OK,
            json!({
                "userId": "u1", "email": "a@b.com", "fullName": "Ana Gómez", "role": 2,
                "organizationId": "org1", "accessToken": "tok1", "refreshToken": "ref1"
            }),
        );
        let context = SessionContext::initialized(Arc::new(SessionManager::new(
            transport.clone(),
            CredentialStore::in_memory(),
        )));
        let mut watcher = context.subscribe();
        assert_eq!(*watcher.borrow_and_update(), SessionState::Unauthenticated);

        context
            .login(&Credentials::new("a@b.com", "secret1"))
            .await
            .unwrap();

        assert!(watcher.has_changed().unwrap());
        assert_eq!(context.user(), Some(sample_user()));
        assert!(context.is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_state() {
        let transport = Arc::new(StubTransport::new());
        transport.script_json(LOGIN_PATH, StatusCode::UNAUTHORIZED, json!({"message": "Bad credentials"}));
        let context = context_with(Arc::new(MemoryStorage::new()), &transport);
        context.initialize();

        let err = context
            .login(&Credentials::new("a@b.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message("Login failed"), "Bad credentials");
        assert_eq!(context.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_register_without_user() {
        let transport = Arc::new(StubTransport::new());
        transport.script_json(
            REGISTER_PATH,
            StatusCode::OK,
            json!({"accessToken": "tok1", "refreshToken": "ref1"}),
        );
        let context = context_with(Arc::new(MemoryStorage::new()), &transport);
        context.initialize();

        let request = RegisterRequest {
            email: "c@d.com".to_string(),
            password: "secret1".to_string(),
            first_name: "Carla".to_string(),
            last_name: "Díaz".to_string(),
            organization_id: None,
        };
        context.register(&request).await.unwrap();
        assert_eq!(context.state(), SessionState::Authenticated(None));
        assert_eq!(context.user(), None);
        assert!(context.is_authenticated());
    }

    #[test]
    fn test_logout() {
        let transport = Arc::new(StubTransport::new());
        let storage = Arc::new(MemoryStorage::new());
        let context = context_with(storage.clone(), &transport);
        context.session().store().set_access_token("tok1").unwrap();
        context.session().store().set_refresh_token("ref1").unwrap();
        context.session().store().set_user(&sample_user()).unwrap();
        context.initialize();
        assert!(context.is_authenticated());

        context.logout();
        assert_eq!(context.state(), SessionState::Unauthenticated);
        assert!(storage.is_empty());
        assert!(!context.session().is_authenticated());
    }
}
