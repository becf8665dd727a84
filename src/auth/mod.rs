//! Credential material and its persistence.

pub mod creds;
pub mod multi_file;
pub mod store;

pub use creds::{Contact, Credentials, CredentialsUpdate, KeyPair, SessionRecord, SignedKeyPair};
pub use multi_file::MultiFileCredentialStore;
pub use store::{CredentialStore, MemoryCredentialStore, StoreError, StoreResult};
