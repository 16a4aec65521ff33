use std::sync::Arc;

use tracing::{debug, warn};

use super::models::{AuthResponse, UserProfile};
use super::storage::{MemoryStorage, Storage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Values older clients wrote under the user key when there was no user
const EMPTY_USER_MARKERS: [&str; 3] = ["", "undefined", "null"];

/// Access token, refresh token and cached user profile, each under its own key.
///
/// The three keys are written independently, so readers must cope with a
/// partial bundle. Reads never fail: a backend error or corrupt value reads as
/// absent.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read credential, treating as absent");
                None
            }
        }
    }

    fn read_token(&self, key: &str) -> Option<String> {
        self.read(key).filter(|token| !token.is_empty())
    }

    // ===== Access token =====

    pub fn access_token(&self) -> Option<String> {
        self.read_token(ACCESS_TOKEN_KEY)
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn remove_access_token(&self) -> Result<(), StorageError> {
        self.storage.remove(ACCESS_TOKEN_KEY)
    }

    // ===== Refresh token =====

    pub fn refresh_token(&self) -> Option<String> {
        self.read_token(REFRESH_TOKEN_KEY)
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(REFRESH_TOKEN_KEY, token)
    }

    pub fn remove_refresh_token(&self) -> Result<(), StorageError> {
        self.storage.remove(REFRESH_TOKEN_KEY)
    }

    // ===== User profile =====

    pub fn user(&self) -> Option<UserProfile> {
        self.read(USER_KEY).and_then(|raw| Self::parse_user(&raw))
    }

    pub fn set_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let json = serde_json::to_string(user)?;
        self.storage.set(USER_KEY, &json)
    }

    pub fn remove_user(&self) -> Result<(), StorageError> {
        self.storage.remove(USER_KEY)
    }

    fn parse_user(raw: &str) -> Option<UserProfile> {
        let raw = raw.trim();
        if EMPTY_USER_MARKERS.contains(&raw) {
            return None;
        }
        match serde_json::from_str::<UserProfile>(raw) {
            Ok(user) if user.id.trim().is_empty() => {
                debug!("Stored user profile has no id, ignoring");
                None
            }
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Stored user profile is corrupt, ignoring");
                None
            }
        }
    }

    // ===== Bundle =====

    /// Write both tokens and the user. `None` removes any stored user.
    pub fn save_bundle(&self, bundle: &AuthResponse) -> Result<(), StorageError> {
        self.set_access_token(&bundle.access_token)?;
        self.set_refresh_token(&bundle.refresh_token)?;
        match bundle.user {
            Some(ref user) => self.set_user(user),
            None => self.remove_user(),
        }
    }

    /// Remove all three keys. Every removal is attempted; the first error is returned.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let results = [
            self.remove_access_token(),
            self.remove_refresh_token(),
            self.remove_user(),
        ];
        results.into_iter().collect()
    }

    /// Check if an access token is stored
    pub fn has_credentials(&self) -> bool {
        self.access_token().is_some()
    }

    /// Fallible read of the access token and user, for callers that must
    /// distinguish a broken backend from an empty one.
    pub fn try_load(&self) -> Result<(Option<String>, Option<UserProfile>), StorageError> {
        let token = self
            .storage
            .get(ACCESS_TOKEN_KEY)?
            .filter(|token| !token.is_empty());
        let user = self
            .storage
            .get(USER_KEY)?
            .and_then(|raw| Self::parse_user(&raw));
        Ok((token, user))
    }
}
