//! Session Layer
//!
//! Connection lifecycle, pairing, keep-alive, delivery tracking and the
//! event bus, layered over a pluggable [`TransportChannel`].

pub mod config;
pub mod delivery;
pub mod error;
pub mod events;
pub mod frame;
pub mod groups;
pub mod keep_alive;
pub mod mock;
pub mod pairing;
pub mod retry;
pub mod session;
pub mod traits;
pub mod websocket;

pub use config::{Browser, SessionConfig};
pub use delivery::DeliveryTracker;
pub use error::{SessionError, SessionResult};
pub use events::{ConnectionUpdate, Event, EventBus, MessageUpdate, Subscription, UpsertKind};
pub use frame::{Frame, GroupMetadata, ParticipantAction, ParticipantResult, Query, QueryResult};
pub use mock::MockTransport;
pub use pairing::{ConnectionState, LastDisconnect, PairingState};
pub use session::SessionController;
pub use traits::{TransportChannel, TransportError, TransportEvent, TransportEvents, TransportResult};
pub use websocket::WebSocketTransport;
