//! Multi-file credential store
//!
//! One folder per account:
//! - `creds.json` holds [`Credentials`]
//! - `pre-keys.json`, `sessions.json`, `identities.json` hold keyed collections
//!
//! Collections are read lazily on every access and rewritten whole on every
//! mutation through a synced temp file + rename, so a crash never leaves a
//! truncated record behind. Lookups treat an unreadable file as empty, but a
//! mutation refuses to rewrite a collection it could not read.

use super::creds::{Credentials, KeyPair, SessionRecord};
use super::store::{CredentialStore, StoreResult};
use crate::serialization::{from_json, to_json};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const CREDS_FILE: &str = "creds.json";
const PRE_KEYS_FILE: &str = "pre-keys.json";
const SESSIONS_FILE: &str = "sessions.json";
const IDENTITIES_FILE: &str = "identities.json";

/// File-backed credential store rooted at one folder
pub struct MultiFileCredentialStore {
    folder: PathBuf,
    /// Serializes read-modify-write cycles on the collection files
    write_lock: Mutex<()>,
}

impl MultiFileCredentialStore {
    /// Open (and create if needed) the store folder
    pub async fn open(folder: impl AsRef<Path>) -> StoreResult<Self> {
        let folder = folder.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&folder).await?;
        Ok(Self {
            folder,
            write_lock: Mutex::new(()),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Read and decode one file; `Ok(None)` when it does not exist
    async fn try_read<T: DeserializeOwned>(&self, file: &str) -> StoreResult<Option<T>> {
        let path = self.folder.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(from_json(&bytes)?))
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        match self.try_read(file).await {
            Ok(value) => value,
            Err(e) => {
                warn!(file, error = %e, "ignoring unreadable credential file");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, file: &str, value: &T) -> StoreResult<()> {
        let bytes = to_json(value)?;
        let path = self.folder.join(file);
        let tmp = self.folder.join(format!("{}.tmp", file));

        let mut out = tokio::fs::File::create(&tmp).await?;
        out.write_all(&bytes).await?;
        out.sync_all().await?;
        drop(out);
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "credential file written");
        Ok(())
    }

    async fn read_collection<T: DeserializeOwned>(&self, file: &str) -> BTreeMap<String, T> {
        self.read(file).await.unwrap_or_default()
    }

    async fn update_collection<T, F>(&self, file: &str, mutate: F) -> StoreResult<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut BTreeMap<String, T>),
    {
        let _guard = self.write_lock.lock().await;
        let mut collection: BTreeMap<String, T> = match self.try_read(file).await {
            Ok(collection) => collection.unwrap_or_default(),
            Err(e) => {
                warn!(file, error = %e, "collection unreadable, not overwriting");
                return Err(e);
            }
        };
        mutate(&mut collection);
        self.write(file, &collection).await
    }
}

#[async_trait]
impl CredentialStore for MultiFileCredentialStore {
    async fn load(&self) -> Credentials {
        self.read(CREDS_FILE).await.unwrap_or_default()
    }

    async fn save(&self, creds: &Credentials) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write(CREDS_FILE, creds).await
    }

    async fn get_pre_key(&self, key_id: u32) -> Option<KeyPair> {
        self.read_collection(PRE_KEYS_FILE)
            .await
            .remove(&key_id.to_string())
    }

    async fn set_pre_key(&self, key_id: u32, key: &KeyPair) -> StoreResult<()> {
        let key = key.clone();
        self.update_collection(PRE_KEYS_FILE, move |keys| {
            keys.insert(key_id.to_string(), key);
        })
        .await
    }

    async fn remove_pre_key(&self, key_id: u32) -> StoreResult<()> {
        self.update_collection::<KeyPair, _>(PRE_KEYS_FILE, |keys| {
            keys.remove(&key_id.to_string());
        })
        .await
    }

    async fn get_session(&self, id: &str) -> Option<SessionRecord> {
        self.read_collection(SESSIONS_FILE).await.remove(id)
    }

    async fn set_session(&self, id: &str, session: &SessionRecord) -> StoreResult<()> {
        let session = session.clone();
        self.update_collection(SESSIONS_FILE, |sessions| {
            sessions.insert(id.to_string(), session);
        })
        .await
    }

    async fn remove_session(&self, id: &str) -> StoreResult<()> {
        self.update_collection::<SessionRecord, _>(SESSIONS_FILE, |sessions| {
            sessions.remove(id);
        })
        .await
    }

    async fn get_identity(&self, id: &str) -> Option<KeyPair> {
        self.read_collection(IDENTITIES_FILE).await.remove(id)
    }

    async fn set_identity(&self, id: &str, identity: &KeyPair) -> StoreResult<()> {
        let identity = identity.clone();
        self.update_collection(IDENTITIES_FILE, |identities| {
            identities.insert(id.to_string(), identity);
        })
        .await
    }

    async fn remove_identity(&self, id: &str) -> StoreResult<()> {
        self.update_collection::<KeyPair, _>(IDENTITIES_FILE, |identities| {
            identities.remove(id);
        })
        .await
    }
}
