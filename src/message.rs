//! Message data model.

use crate::codec::Payload;
use crate::jid::Jid;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix shared by every locally generated message id
pub const MESSAGE_ID_PREFIX: &str = "3EB0";

/// Immutable address of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: Jid,
    pub from_me: bool,
    pub id: String,
    /// Sender inside a group chat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
}

impl MessageKey {
    /// Key for a message this session sends
    pub fn outgoing(remote_jid: Jid, id: String) -> Self {
        Self {
            remote_jid,
            from_me: true,
            id,
            participant: None,
        }
    }
}

/// Delivery status of a message
///
/// Ordered by progress: `Pending < ServerAck < DeliveryAck < Read < Played`.
/// `Error` sits outside that order and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum MessageStatus {
    Error,
    Pending,
    ServerAck,
    DeliveryAck,
    Read,
    Played,
}

impl MessageStatus {
    /// Wire code (`-1..=4`)
    pub fn code(self) -> i8 {
        match self {
            MessageStatus::Error => -1,
            MessageStatus::Pending => 0,
            MessageStatus::ServerAck => 1,
            MessageStatus::DeliveryAck => 2,
            MessageStatus::Read => 3,
            MessageStatus::Played => 4,
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Error | MessageStatus::Played)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            MessageStatus::Error => true,
            _ => next.code() > self.code(),
        }
    }
}

impl TryFrom<i8> for MessageStatus {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, String> {
        match code {
            -1 => Ok(MessageStatus::Error),
            0 => Ok(MessageStatus::Pending),
            1 => Ok(MessageStatus::ServerAck),
            2 => Ok(MessageStatus::DeliveryAck),
            3 => Ok(MessageStatus::Read),
            4 => Ok(MessageStatus::Played),
            other => Err(format!("unknown message status code {}", other)),
        }
    }
}

impl From<MessageStatus> for i8 {
    fn from(status: MessageStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageStatus::Error => "ERROR",
            MessageStatus::Pending => "PENDING",
            MessageStatus::ServerAck => "SERVER_ACK",
            MessageStatus::DeliveryAck => "DELIVERY_ACK",
            MessageStatus::Read => "READ",
            MessageStatus::Played => "PLAYED",
        };
        f.write_str(name)
    }
}

/// A sent or received message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub key: MessageKey,
    #[serde(rename = "message")]
    pub content: Payload,
    /// Seconds since the Unix epoch
    #[serde(rename = "messageTimestamp")]
    pub timestamp: u64,
    #[serde(default = "pending")]
    pub status: MessageStatus,
}

fn pending() -> MessageStatus {
    MessageStatus::Pending
}

/// Generate a fresh message id: `3EB0` followed by 16 upper-case hex digits
pub fn generate_message_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", MESSAGE_ID_PREFIX, hex::encode_upper(bytes))
}

/// Current time in whole seconds since the Unix epoch
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
