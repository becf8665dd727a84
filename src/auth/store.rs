//! Credential Store Contract
//!
//! The session layer consumes persisted state only through [`CredentialStore`]:
//! - `load` never fails; missing or corrupt records yield empty credentials
//! - `save` reports failures, and the session logs them without propagating
//! - keyed accessors return `None` on a miss and are durable once they resolve

use super::creds::{Credentials, KeyPair, SessionRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Result type for store mutations
pub type StoreResult<T> = Result<T, StoreError>;

/// Credential store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<crate::serialization::SerializationError> for StoreError {
    fn from(err: crate::serialization::SerializationError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Persistent credential and key-material storage
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Load credentials, falling back to the empty default
    async fn load(&self) -> Credentials;

    /// Persist credentials
    async fn save(&self, creds: &Credentials) -> StoreResult<()>;

    async fn get_pre_key(&self, key_id: u32) -> Option<KeyPair>;
    async fn set_pre_key(&self, key_id: u32, key: &KeyPair) -> StoreResult<()>;
    async fn remove_pre_key(&self, key_id: u32) -> StoreResult<()>;

    async fn get_session(&self, id: &str) -> Option<SessionRecord>;
    async fn set_session(&self, id: &str, session: &SessionRecord) -> StoreResult<()>;
    async fn remove_session(&self, id: &str) -> StoreResult<()>;

    async fn get_identity(&self, id: &str) -> Option<KeyPair>;
    async fn set_identity(&self, id: &str, identity: &KeyPair) -> StoreResult<()>;
    async fn remove_identity(&self, id: &str) -> StoreResult<()>;
}

/// In-memory credential store for testing
///
/// Clones share state, so a test can keep a handle while the session owns
/// another.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    creds: Option<Credentials>,
    pre_keys: HashMap<u32, KeyPair>,
    sessions: HashMap<String, SessionRecord>,
    identities: HashMap<String, KeyPair>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with credentials
    pub fn with_credentials(creds: Credentials) -> Self {
        let store = Self::default();
        store.lock().creds = Some(creds);
        store
    }

    /// Make every subsequent `save` fail
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Last successfully saved credentials
    pub fn saved(&self) -> Option<Credentials> {
        self.lock().creds.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Credentials {
        self.lock().creds.clone().unwrap_or_default()
    }

    async fn save(&self, creds: &Credentials) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".to_string()));
        }
        state.creds = Some(creds.clone());
        state.saves += 1;
        Ok(())
    }

    async fn get_pre_key(&self, key_id: u32) -> Option<KeyPair> {
        self.lock().pre_keys.get(&key_id).cloned()
    }

    async fn set_pre_key(&self, key_id: u32, key: &KeyPair) -> StoreResult<()> {
        self.lock().pre_keys.insert(key_id, key.clone());
        Ok(())
    }

    async fn remove_pre_key(&self, key_id: u32) -> StoreResult<()> {
        self.lock().pre_keys.remove(&key_id);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Option<SessionRecord> {
        self.lock().sessions.get(id).cloned()
    }

    async fn set_session(&self, id: &str, session: &SessionRecord) -> StoreResult<()> {
        self.lock().sessions.insert(id.to_string(), session.clone());
        Ok(())
    }

    async fn remove_session(&self, id: &str) -> StoreResult<()> {
        self.lock().sessions.remove(id);
        Ok(())
    }

    async fn get_identity(&self, id: &str) -> Option<KeyPair> {
        self.lock().identities.get(id).cloned()
    }

    async fn set_identity(&self, id: &str, identity: &KeyPair) -> StoreResult<()> {
        self.lock().identities.insert(id.to_string(), identity.clone());
        Ok(())
    }

    async fn remove_identity(&self, id: &str) -> StoreResult<()> {
        self.lock().identities.remove(id);
        Ok(())
    }
}
