//! Lotus - always-on chat client
//!
//! Keeps one persistent session to the chat service: pairs a device by QR
//! code or resumes from stored credentials, keeps the connection alive, and
//! sends messages while tracking each one through its delivery statuses.
//!
//! ```text
//! caller ──► SessionController ──► TransportChannel (WebSocket / mock)
//!                 │    │
//!                 │    └──► CredentialStore (files / memory)
//!                 └──► EventBus ──► subscribers
//! ```

pub mod auth;
pub mod codec;
pub mod jid;
pub mod message;
pub mod serialization;
pub mod socket;

pub use auth::{CredentialStore, Credentials, MemoryCredentialStore, MultiFileCredentialStore};
pub use codec::MessageContent;
pub use jid::Jid;
pub use message::{Message, MessageStatus};
pub use socket::{Event, SessionConfig, SessionController, SessionError, SessionResult};
