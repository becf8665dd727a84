//! Delivery Tracker
//!
//! Per-message status progression driven by inbound acknowledgements:
//!
//! ```text
//! PENDING(0) -> SERVER_ACK(1) -> DELIVERY_ACK(2) -> READ(3) -> PLAYED(4)
//!      \______________\_______________\_____________\-> ERROR(-1)
//! ```
//!
//! - Statuses only move forward; an ack may skip ahead but never back
//! - `ERROR` and `PLAYED` are terminal; a message reaching either is
//!   dropped, so later acks for it land on an unknown id
//! - Every accepted transition yields exactly one [`MessageUpdate`]
//! - Nothing here runs on a timer: a message left in `PENDING` stays there
//!   until a signal arrives

use super::events::MessageUpdate;
use crate::message::{MessageKey, MessageStatus};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A message being tracked for delivery
#[derive(Debug, Clone)]
pub struct TrackedMessage {
    pub key: MessageKey,
    pub status: MessageStatus,
}

/// Tracks delivery status of the messages sent in this session that have
/// not reached a terminal status
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    messages: HashMap<String, TrackedMessage>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly sent message in `PENDING`
    pub fn track(&mut self, key: MessageKey) {
        self.messages.insert(
            key.id.clone(),
            TrackedMessage {
                key,
                status: MessageStatus::Pending,
            },
        );
    }

    /// Whether an id is still being tracked. New ids are 64 random bits, so
    /// checking the live set is enough to keep them unique.
    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn status(&self, id: &str) -> Option<MessageStatus> {
        self.messages.get(id).map(|m| m.status)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Apply an observed status signal
    ///
    /// Returns the update to publish, or `None` when the signal is ignored
    /// (unknown or evicted id, stale or repeated status).
    pub fn apply(&mut self, id: &str, status: MessageStatus) -> Option<MessageUpdate> {
        let Some(tracked) = self.messages.get_mut(id) else {
            warn!(id, %status, "ack for unknown message ignored");
            return None;
        };

        if !tracked.status.can_advance_to(status) {
            debug!(
                id,
                current = %tracked.status,
                received = %status,
                "non-monotonic ack ignored"
            );
            return None;
        }

        debug!(id, from = %tracked.status, to = %status, "message status advanced");
        tracked.status = status;
        let update = MessageUpdate {
            key: tracked.key.clone(),
            status,
        };
        if status.is_terminal() {
            self.messages.remove(id);
        }
        Some(update)
    }
}
