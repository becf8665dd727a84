//! JSON serialization for persisted credentials and wire frames.
//!
//! - Credential records are pretty-printed JSON
//! - Binary fields in credential records use the tagged buffer form
//!   `{"type": "Buffer", "data": [1, 2, 3]}` so they survive a round-trip
//!   through a text format without ambiguity
//! - Binary fields in wire frames are base64 strings

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Type tag carried by every serialized buffer.
pub const BUFFER_TAG: &str = "Buffer";

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// JSON encoding failed.
    #[error("JSON encoding failed: {0}")]
    Encode(String),

    /// JSON decoding failed.
    #[error("JSON decoding failed: {0}")]
    Decode(String),
}

/// Serialize to pretty JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec_pretty(value).map_err(|e| SerializationError::Encode(e.to_string()))
}

/// Deserialize from JSON bytes.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::Decode(e.to_string()))
}

#[derive(Serialize)]
struct TaggedBufferRef<'a> {
    #[serde(rename = "type")]
    tag: &'static str,
    data: &'a [u8],
}

#[derive(Deserialize)]
struct TaggedBuffer {
    #[serde(rename = "type")]
    tag: String,
    data: Vec<u8>,
}

/// `#[serde(with = "tagged_buffer")]` for `Vec<u8>` fields.
pub mod tagged_buffer {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        TaggedBufferRef {
            tag: BUFFER_TAG,
            data: bytes,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let buffer = TaggedBuffer::deserialize(deserializer)?;
        if buffer.tag != BUFFER_TAG {
            return Err(serde::de::Error::custom(format!(
                "expected buffer tag '{}', found '{}'",
                BUFFER_TAG, buffer.tag
            )));
        }
        Ok(buffer.data)
    }
}

/// `#[serde(with = "base64_bytes")]` for binary fields inside wire frames.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
