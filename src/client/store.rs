//! Client-side session persistence.
//!
//! A session is the access token plus the user it belongs to, kept under
//! two fixed keys of a string key-value [`Storage`]. The two are written
//! and cleared together. A clear also sweeps any other key that looks
//! auth-related so stale credentials cannot linger.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::service::UserSnapshot;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const USER_KEY: &str = "user";

const SWEPT_FRAGMENTS: [&str; 3] = ["token", "auth", "user"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent string key-value storage.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Write all entries in one step.
    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError>;

    /// Remove every key matching `predicate` in one step.
    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> Result<(), StorageError>;

    fn keys(&self) -> Vec<String>;
}

// ============================================================================
// Backends
// ============================================================================

/// Process-local storage, lost on exit.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> Result<(), StorageError> {
        self.entries.write().retain(|key, _| !predicate(key));
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

/// Storage persisted as a JSON object in a single file. Writes go to a
/// temporary file that is then renamed over the original.
pub struct FileStorage {
    entries: RwLock<BTreeMap<String, String>>,
    path: PathBuf,
}

impl FileStorage {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            entries: RwLock::new(entries),
            path,
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set_all(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        let mut map = self.entries.write();
        let mut next = map.clone();
        for (key, value) in entries {
            next.insert(key.to_string(), value.to_string());
        }
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn remove_where(&self, predicate: &dyn Fn(&str) -> bool) -> Result<(), StorageError> {
        let mut map = self.entries.write();
        let mut next = map.clone();
        next.retain(|key, _| !predicate(key));
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

// ============================================================================
// Session store
// ============================================================================

/// A complete, consistent session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub user: UserSnapshot,
}

fn is_auth_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SWEPT_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Typed view of the session held in a [`Storage`].
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// The stored access token, as attached to outgoing requests.
    pub fn access_token(&self) -> Option<String> {
        self.storage
            .get(ACCESS_TOKEN_KEY)
            .filter(|token| !token.is_empty())
    }

    /// The stored session. Any inconsistency (token without user, user
    /// without token, unparsable user) clears the store and yields `None`.
    pub fn session(&self) -> Option<Session> {
        let token = self.access_token();
        let raw_user = self.storage.get(USER_KEY);

        match (token, raw_user) {
            (None, None) => None,
            (Some(access_token), Some(raw)) => match serde_json::from_str::<UserSnapshot>(&raw) {
                Ok(user) => Some(Session { access_token, user }),
                Err(e) => {
                    tracing::warn!(error = %e, "Stored user is corrupt, clearing session");
                    self.clear();
                    None
                }
            },
            _ => {
                tracing::warn!("Stored session is incomplete, clearing session");
                self.clear();
                None
            }
        }
    }

    pub fn user(&self) -> Option<UserSnapshot> {
        self.session().map(|s| s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// Overwrite the session. Without a user only the token is replaced
    /// and the stored user is kept.
    pub fn save(&self, access_token: &str, user: Option<&UserSnapshot>) -> Result<(), StorageError> {
        match user {
            Some(user) => {
                let user_json = serde_json::to_string(user)?;
                self.storage
                    .set_all(&[(ACCESS_TOKEN_KEY, access_token), (USER_KEY, user_json.as_str())])
            }
            None => self.storage.set_all(&[(ACCESS_TOKEN_KEY, access_token)]),
        }
    }

    /// Remove the session and every auth-looking key. Never fails; a
    /// storage error is logged.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_where(&is_auth_key) {
            tracing::error!(error = %e, "Failed to clear session storage");
            return;
        }
        tracing::debug!("Cleared session storage");
    }
}
