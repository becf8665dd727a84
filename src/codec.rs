//! Message Codec
//!
//! Builds the canonical payload shapes the transport serializes from typed
//! content. Every builder is pure: media arrives either as raw bytes or as
//! base64 text and leaves as raw bytes plus its length and SHA-256 digest.

use crate::serialization::base64_bytes;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const IMAGE_MIMETYPE: &str = "image/jpeg";
pub const VIDEO_MIMETYPE: &str = "video/mp4";
pub const AUDIO_MIMETYPE: &str = "audio/ogg; codecs=opus";

/// Codec errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("media is not valid base64: {0}")]
    InvalidMedia(String),

    #[error("media payload is empty")]
    EmptyMedia,

    #[error("contact list is empty")]
    NoContacts,

    #[error("coordinates out of range: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Binary media as handed in by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    /// Standard base64 text
    Encoded(String),
}

impl MediaSource {
    /// Normalize to raw bytes
    pub fn into_bytes(self) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            MediaSource::Bytes(bytes) => bytes,
            MediaSource::Encoded(text) => STANDARD
                .decode(text.trim().as_bytes())
                .map_err(|e| CodecError::InvalidMedia(e.to_string()))?,
        };
        if bytes.is_empty() {
            return Err(CodecError::EmptyMedia);
        }
        Ok(bytes)
    }
}

impl From<Vec<u8>> for MediaSource {
    fn from(bytes: Vec<u8>) -> Self {
        MediaSource::Bytes(bytes)
    }
}

impl From<&[u8]> for MediaSource {
    fn from(bytes: &[u8]) -> Self {
        MediaSource::Bytes(bytes.to_vec())
    }
}

/// One entry of a shared contact list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    pub display_name: String,
    pub vcard: String,
}

/// Typed outbound content
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Image {
        media: MediaSource,
        caption: Option<String>,
    },
    Video {
        media: MediaSource,
        caption: Option<String>,
    },
    Audio {
        media: MediaSource,
        /// Voice note
        ptt: bool,
    },
    Document {
        media: MediaSource,
        mimetype: String,
        file_name: String,
    },
    Contacts(Vec<ContactCard>),
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
}

/// Canonical media body shared by every media payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBody {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mimetype: String,
    pub file_length: u64,
    #[serde(with = "base64_bytes")]
    pub file_sha256: Vec<u8>,
}

impl MediaBody {
    fn new(data: Vec<u8>, mimetype: impl Into<String>) -> Self {
        let file_sha256 = Sha256::digest(&data).to_vec();
        Self {
            file_length: data.len() as u64,
            file_sha256,
            data,
            mimetype: mimetype.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionedMedia {
    #[serde(flatten)]
    pub media: MediaBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMedia {
    #[serde(flatten)]
    pub media: MediaBody,
    #[serde(default)]
    pub ptt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMedia {
    #[serde(flatten)]
    pub media: MediaBody,
    pub title: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactsArray {
    pub contacts: Vec<ContactCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPin {
    pub degrees_latitude: f64,
    pub degrees_longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Protocol-level message payload
///
/// Serializes as a single-key object named after the content kind, e.g.
/// `{"conversation": "hi"}` or `{"imageMessage": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload {
    Conversation(String),
    ImageMessage(CaptionedMedia),
    VideoMessage(CaptionedMedia),
    AudioMessage(AudioMedia),
    DocumentMessage(DocumentMedia),
    ContactsArrayMessage(ContactsArray),
    LocationMessage(LocationPin),
}

impl Payload {
    /// Wire name of the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Conversation(_) => "conversation",
            Payload::ImageMessage(_) => "imageMessage",
            Payload::VideoMessage(_) => "videoMessage",
            Payload::AudioMessage(_) => "audioMessage",
            Payload::DocumentMessage(_) => "documentMessage",
            Payload::ContactsArrayMessage(_) => "contactsArrayMessage",
            Payload::LocationMessage(_) => "locationMessage",
        }
    }

    /// Text body, if this payload carries one
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Conversation(text) => Some(text),
            Payload::ImageMessage(m) | Payload::VideoMessage(m) => m.caption.as_deref(),
            _ => None,
        }
    }
}

/// Build the canonical payload for typed content
pub fn build_payload(content: MessageContent) -> Result<Payload, CodecError> {
    let payload = match content {
        MessageContent::Text(text) => Payload::Conversation(text),
        MessageContent::Image { media, caption } => Payload::ImageMessage(CaptionedMedia {
            media: MediaBody::new(media.into_bytes()?, IMAGE_MIMETYPE),
            caption: caption.filter(|c| !c.is_empty()),
        }),
        MessageContent::Video { media, caption } => Payload::VideoMessage(CaptionedMedia {
            media: MediaBody::new(media.into_bytes()?, VIDEO_MIMETYPE),
            caption: caption.filter(|c| !c.is_empty()),
        }),
        MessageContent::Audio { media, ptt } => Payload::AudioMessage(AudioMedia {
            media: MediaBody::new(media.into_bytes()?, AUDIO_MIMETYPE),
            ptt,
        }),
        MessageContent::Document {
            media,
            mimetype,
            file_name,
        } => Payload::DocumentMessage(DocumentMedia {
            media: MediaBody::new(media.into_bytes()?, mimetype),
            title: file_name.clone(),
            file_name,
        }),
        MessageContent::Contacts(contacts) => {
            if contacts.is_empty() {
                return Err(CodecError::NoContacts);
            }
            Payload::ContactsArrayMessage(ContactsArray { contacts })
        }
        MessageContent::Location {
            latitude,
            longitude,
            name,
            address,
        } => {
            let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
            if !valid {
                return Err(CodecError::InvalidCoordinates {
                    latitude,
                    longitude,
                });
            }
            Payload::LocationMessage(LocationPin {
                degrees_latitude: latitude,
                degrees_longitude: longitude,
                name,
                address,
            })
        }
    };
    Ok(payload)
}
