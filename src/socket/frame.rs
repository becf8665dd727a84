//! Wire frames exchanged with the remote endpoint.
//!
//! Frames are JSON objects tagged by `type`. Only the session controller
//! produces or interprets them.

use crate::auth::Contact;
use crate::jid::Jid;
use crate::message::{Message, MessageStatus};
use crate::serialization::base64_bytes;
use serde::{Deserialize, Serialize};

/// One protocol frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    // Outbound
    KeepAlive,
    Resume { me: Jid },
    Query { tag: String, query: Query },
    Logout,

    // Both directions
    Message { message: Message },

    // Inbound
    /// The pairing code was scanned and accepted
    PairSuccess { me: Contact },
    ResumeSuccess,
    /// Pairing or resume was refused
    Failure { reason: String },
    /// Delivery acknowledgement for a sent message
    Ack { id: String, status: MessageStatus },
    QueryResult { tag: String, result: QueryResult },
}

impl Frame {
    /// Wire name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::KeepAlive => "keep_alive",
            Frame::Resume { .. } => "resume",
            Frame::Query { .. } => "query",
            Frame::Logout => "logout",
            Frame::Message { .. } => "message",
            Frame::PairSuccess { .. } => "pair_success",
            Frame::ResumeSuccess => "resume_success",
            Frame::Failure { .. } => "failure",
            Frame::Ack { .. } => "ack",
            Frame::QueryResult { .. } => "query_result",
        }
    }
}

/// Participant mutation inside a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantChange {
    pub jid: Jid,
    pub action: ParticipantAction,
}

/// Request half of a request/response command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    CreateGroup {
        subject: String,
        participants: Vec<Jid>,
    },
    UpdateGroupSubject {
        jid: Jid,
        subject: String,
    },
    UpdateGroupDescription {
        jid: Jid,
        description: String,
    },
    UpdateGroupParticipants {
        jid: Jid,
        changes: Vec<ParticipantChange>,
    },
    LeaveGroup {
        jid: Jid,
    },
    GetStatus {
        jid: Jid,
    },
    UpdateStatus {
        status: String,
    },
    UpdateProfilePicture {
        jid: Jid,
        #[serde(with = "base64_bytes")]
        image: Vec<u8>,
    },
    UpdateProfileName {
        name: String,
    },
}

/// Group metadata returned by group creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub id: Jid,
    pub subject: String,
    /// Seconds since the Unix epoch
    pub creation: u64,
    pub owner: Option<Jid>,
}

/// Per-participant outcome of a participant update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantResult {
    pub jid: Jid,
    pub status: String,
}

/// Response half of a request/response command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    Ok,
    Group(GroupMetadata),
    Participants { participants: Vec<ParticipantResult> },
    Status { status: String },
    Error { code: u16, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Payload;
    use crate::message::MessageKey;

    fn parse(json: &str) -> Frame {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_keep_alive_frame_shape() {
        assert_eq!(
            serde_json::to_string(&Frame::KeepAlive).unwrap(),
            r#"{"type":"keep_alive"}"#
        );
    }

    #[test]
    fn test_inbound_frames_parse() {
        assert_eq!(
            parse(r#"{"type":"ack","id":"3EB0ABCDEF0123456789","status":2}"#),
            Frame::Ack {
                id: "3EB0ABCDEF0123456789".into(),
                status: MessageStatus::DeliveryAck,
            }
        );
        assert_eq!(parse(r#"{"type":"resume_success"}"#), Frame::ResumeSuccess);

        match parse(
            r#"{"type":"pair_success","me":{"id":"15550100000@s.whatsapp.net","name":"Ada"}}"#,
        ) {
            Frame::PairSuccess { me } => assert_eq!(me.name, "Ada"),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_ack_with_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<Frame>(r#"{"type":"ack","id":"x","status":9}"#).is_err());
    }

    #[test]
    fn test_message_frame_shape() {
        let frame = Frame::Message {
            message: Message {
                key: MessageKey::outgoing("123@g.us".parse().unwrap(), "3EB0".into()),
                content: Payload::Conversation("hey".into()),
                timestamp: 1,
                status: MessageStatus::Pending,
            },
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["message"]["message"]["conversation"], "hey");
    }

    #[test]
    fn test_query_frame_shape() {
        let frame = Frame::Query {
            tag: "q1".into(),
            query: Query::UpdateGroupParticipants {
                jid: "123@g.us".parse().unwrap(),
                changes: vec![ParticipantChange {
                    jid: "15550100000@s.whatsapp.net".parse().unwrap(),
                    action: ParticipantAction::Promote,
                }],
            },
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "query");
        assert_eq!(value["query"]["kind"], "update_group_participants");
        assert_eq!(value["query"]["changes"][0]["action"], "promote");
    }

    #[test]
    fn test_query_result_parse() {
        let frame = parse(
            r#"{"type":"query_result","tag":"q1","result":{"kind":"group","id":"42@g.us","subject":"Team","creation":7,"owner":null}}"#,
        );
        match frame {
            Frame::QueryResult {
                result: QueryResult::Group(meta),
                ..
            } => {
                assert_eq!(meta.subject, "Team");
                assert!(meta.id.is_group());
                assert_eq!(meta.owner, None);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }
}
