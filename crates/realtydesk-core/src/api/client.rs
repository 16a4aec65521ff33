//! API client for the RealtyDesk REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! calls against the CRM resource endpoints. All calls go through the
//! `RequestPipeline`, which attaches the bearer token and recovers from an
//! expired access token.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, SessionManager};

use super::normalize::normalize_list;
use super::pipeline::RequestPipeline;
use super::resources::Resource;
use super::transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the CRM backend.
/// Clone is cheap - the pipeline and session are shared.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<RequestPipeline>,
}

impl ApiClient {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Wire a client, session manager and pipeline over one shared transport
    pub fn with_transport(transport: Arc<dyn HttpTransport>, store: CredentialStore) -> Self {
        let session = Arc::new(SessionManager::new(transport.clone(), store));
        Self::new(Arc::new(RequestPipeline::new(transport, session)))
    }

    /// Create a client talking to `base_url` over HTTP
    pub fn connect(base_url: &str, store: CredentialStore) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(base_url)?;
        Ok(Self::with_transport(Arc::new(transport), store))
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.pipeline.session()
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    /// Send through the pipeline, backing off on 429.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            match self.pipeline.send(request.clone()).await {
                Err(ApiError::RateLimited) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(path = %request.path, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
                result => return result,
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    // ===== Resource helpers =====

    /// Fetch a whole collection, whatever envelope the endpoint uses
    pub async fn list<T: DeserializeOwned>(&self, resource: Resource) -> Result<Vec<T>, ApiError> {
        let value: serde_json::Value = self.get(&resource.path()).await?;
        normalize_list(value)
    }

    pub async fn fetch<T: DeserializeOwned>(&self, resource: Resource, id: &str) -> Result<T, ApiError> {
        self.get(&resource.item_path(id)).await
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(&self, resource: Resource, body: &B) -> Result<T, ApiError> {
        self.post(&resource.path(), body).await
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.put(&resource.item_path(id), body).await
    }

    pub async fn remove(&self, resource: Resource, id: &str) -> Result<(), ApiError> {
        self.delete(&resource.item_path(id)).await
    }
}
