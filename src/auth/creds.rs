//! Long-lived identity and session material.

use crate::jid::Jid;
use crate::serialization::tagged_buffer;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Identity the session is paired with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Jid,
    pub name: String,
}

/// Curve key pair; the private half is wiped on drop
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    #[serde(with = "tagged_buffer")]
    pub private: Vec<u8>,
    #[serde(with = "tagged_buffer")]
    pub public: Vec<u8>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"<redacted>")
            .field("public", &hex::encode(&self.public))
            .finish()
    }
}

/// Pre-key signed by the identity key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedKeyPair {
    pub key_pair: KeyPair,
    #[serde(with = "tagged_buffer")]
    pub signature: Vec<u8>,
    pub key_id: u32,
}

/// Opaque per-peer session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord(#[serde(with = "tagged_buffer")] pub Vec<u8>);

/// Session credentials
///
/// Created empty on first run. `me` is set when pairing completes and cleared
/// on logout; everything else is carried through untouched by the session
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Contact>,
    #[serde(default)]
    pub noise_key: Option<KeyPair>,
    #[serde(default)]
    pub signed_identity_key: Option<KeyPair>,
    #[serde(default)]
    pub signed_pre_key: Option<SignedKeyPair>,
    #[serde(default)]
    pub registration_id: u32,
    #[serde(default)]
    pub adv_secret_key: String,
    #[serde(default = "first_pre_key_id")]
    pub next_pre_key_id: u32,
    #[serde(default = "first_pre_key_id")]
    pub first_unuploaded_pre_key_id: u32,
    #[serde(default)]
    pub server_has_pre_keys: bool,
}

fn first_pre_key_id() -> u32 {
    1
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            me: None,
            noise_key: None,
            signed_identity_key: None,
            signed_pre_key: None,
            registration_id: 0,
            adv_secret_key: String::new(),
            next_pre_key_id: first_pre_key_id(),
            first_unuploaded_pre_key_id: first_pre_key_id(),
            server_has_pre_keys: false,
        }
    }
}

impl Credentials {
    /// Whether these credentials can resume without pairing
    pub fn is_paired(&self) -> bool {
        self.me.is_some()
    }
}

/// Partial credentials carried by a `creds.update` notification
///
/// Only the paired identity changes inside the session layer; `me` is the
/// value after the change (`None` after logout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialsUpdate {
    pub me: Option<Contact>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{from_json, to_json};

    fn paired() -> Credentials {
        Credentials {
            me: Some(Contact {
                id: "15550100000@s.whatsapp.net".parse().unwrap(),
                name: "Lotus".to_string(),
            }),
            noise_key: Some(KeyPair {
                private: vec![1; 32],
                public: vec![2; 32],
            }),
            signed_pre_key: Some(SignedKeyPair {
                key_pair: KeyPair {
                    private: vec![3; 32],
                    public: vec![4; 32],
                },
                signature: vec![5; 64],
                key_id: 1,
            }),
            registration_id: 4242,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_is_unpaired() {
        let creds = Credentials::default();
        assert!(!creds.is_paired());
        assert_eq!(creds.next_pre_key_id, 1);
        assert_eq!(creds.first_unuploaded_pre_key_id, 1);
    }

    #[test]
    fn test_persisted_layout_uses_camel_case_and_tagged_buffers() {
        let value: serde_json::Value = serde_json::from_slice(&to_json(&paired()).unwrap()).unwrap();
        assert_eq!(value["me"]["id"], "15550100000@s.whatsapp.net");
        assert_eq!(value["registrationId"], 4242);
        assert_eq!(value["noiseKey"]["public"]["type"], "Buffer");
        assert_eq!(value["signedPreKey"]["keyId"], 1);
    }

    #[test]
    fn test_round_trip_through_text() {
        let creds = paired();
        let back: Credentials = from_json(&to_json(&creds).unwrap()).unwrap();
        assert_eq!(back, creds);
    }

    #[test]
    fn test_sparse_record_fills_defaults() {
        let creds: Credentials = from_json(br#"{"registrationId": 9}"#).unwrap();
        assert_eq!(creds.registration_id, 9);
        assert_eq!(creds.next_pre_key_id, 1);
        assert!(creds.noise_key.is_none());
    }

    #[test]
    fn test_key_pair_debug_redacts_private_half() {
        let pair = KeyPair {
            private: vec![0xAA; 4],
            public: vec![0xBB; 2],
        };
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("bbbb"));
        assert!(!rendered.contains("aa"));
    }
}
