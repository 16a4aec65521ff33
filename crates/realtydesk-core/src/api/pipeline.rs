//! Authorized request pipeline with single-flight token refresh.
//!
//! Every resource call goes through `RequestPipeline::send`:
//!
//! - outbound, the stored access token is attached as a bearer credential
//!   (never on the login or refresh endpoints);
//! - inbound, a 401 on an ordinary request that has not been retried yet
//!   starts recovery. The first such request refreshes the session; any 401
//!   arriving while that refresh is in flight parks on a queue and is settled
//!   by the same outcome. Exactly one refresh call is made per round.
//!   A 401 for a token that has since been replaced is retried with the
//!   stored token instead of starting another round.
//!
//! If there is no refresh token or the refresh fails, the session is logged
//! out (which notifies the host to show its login screen) and every parked
//! request fails.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, SessionManager};

use super::transport::{ApiRequest, ApiResponse, HttpTransport};
use super::ApiError;

/// Outcome handed to a parked request: the new access token or the failure.
type RefreshOutcome = Result<String, ApiError>;

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    queue: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Role {
    /// This request performs the refresh.
    Leader,
    /// A refresh is already running; wait for its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionManager>,
    state: Mutex<RefreshState>,
}

impl RequestPipeline {
    pub fn new(transport: Arc<dyn HttpTransport>, session: Arc<SessionManager>) -> Self {
        Self {
            transport,
            session,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Whether a refresh round is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.lock_state().is_refreshing
    }

    /// Number of requests parked behind the current refresh
    pub fn queued(&self) -> usize {
        self.lock_state().queue.len()
    }

    /// Send a request, recovering once from an expired access token.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.authorize(&mut request)?;

        match self.dispatch(&request).await {
            Err(err) if Self::should_recover(&request, &err) => self.recover(request, err).await,
            result => result,
        }
    }

    fn authorize(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        if request.is_auth_endpoint() {
            request.clear_bearer();
            return Ok(());
        }
        match self.session.store().access_token() {
            Some(token) => request.set_bearer(&token),
            None => Ok(()),
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.transport.execute(request).await?.error_for_status()
    }

    fn should_recover(request: &ApiRequest, err: &ApiError) -> bool {
        err.is_unauthorized() && !request.is_auth_endpoint() && !request.retried
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// End the refresh round: clear the flag and take every parked request,
    /// in one critical section so nothing can enqueue behind the drain.
    fn finish_round(&self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        let mut state = self.lock_state();
        state.is_refreshing = false;
        std::mem::take(&mut state.queue)
    }

    /// Settle parked requests in the order they arrived. A waiter whose
    /// caller already gave up has dropped its receiver; that send is a no-op.
    fn settle(waiters: Vec<oneshot::Sender<RefreshOutcome>>, outcome: &RefreshOutcome) {
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn recover(&self, mut request: ApiRequest, original: ApiError) -> Result<ApiResponse, ApiError> {
        request.retried = true;

        if let Some(current) = self.session.store().access_token() {
            if request.bearer_token() != Some(current.as_str()) {
                debug!(path = %request.path, "Token already refreshed, retrying");
                return self.retry(request, &current).await;
            }
        }

        let role = {
            let mut state = self.lock_state();
            if state.is_refreshing {
                let (tx, rx) = oneshot::channel();
                state.queue.push(tx);
                Role::Waiter(rx)
            } else {
                state.is_refreshing = true;
                Role::Leader
            }
        };

        match role {
            Role::Waiter(rx) => {
                debug!(path = %request.path, "Refresh in progress, queueing request");
                // A dropped sender means the refreshing request was cancelled
                let token = rx.await.map_err(|_| ApiError::SessionExpired)??;
                self.retry(request, &token).await
            }
            Role::Leader => self.lead_refresh(request, original).await,
        }
    }

    async fn lead_refresh(&self, request: ApiRequest, original: ApiError) -> Result<ApiResponse, ApiError> {
        info!(path = %request.path, "Access token rejected, refreshing session");

        let guard = RoundGuard { pipeline: self, armed: true };
        let refreshed = self.session.refresh_token().await;
        let waiters = guard.disarm();

        match refreshed {
            Ok(bundle) => {
                let token = bundle.access_token;
                debug!(waiting = waiters.len(), "Refresh succeeded, releasing queued requests");
                Self::settle(waiters, &Ok(token.clone()));
                self.retry(request, &token).await
            }
            Err(AuthError::NoRefreshToken) => {
                warn!("No refresh token available, ending session");
                Self::settle(waiters, &Err(ApiError::SessionExpired));
                self.session.logout();
                Err(original)
            }
            Err(err) => {
                let err = ApiError::RefreshFailed(Box::new(err.into_api_error()));
                error!(error = %err, waiting = waiters.len(), "Refresh failed, ending session");
                Self::settle(waiters, &Err(err.clone()));
                self.session.logout();
                Err(err)
            }
        }
    }

    /// Re-issue a request with a fresh token. A 401 now is final.
    async fn retry(&self, mut request: ApiRequest, token: &str) -> Result<ApiResponse, ApiError> {
        request.set_bearer(token)?;
        debug!(path = %request.path, "Retrying request with refreshed token");
        self.dispatch(&request).await
    }
}

/// Keeps a refresh round from wedging if the refreshing request is dropped
/// mid-flight: the flag is cleared and parked requests are released with an
/// error.
struct RoundGuard<'a> {
    pipeline: &'a RequestPipeline,
    armed: bool,
}

impl RoundGuard<'_> {
    fn disarm(mut self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        self.armed = false;
        self.pipeline.finish_round()
    }
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Refresh cancelled, releasing queued requests");
            let waiters = self.pipeline.finish_round();
            RequestPipeline::settle(waiters, &Err(ApiError::SessionExpired));
        }
    }
}
