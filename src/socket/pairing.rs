//! Connection and pairing states.

use super::error::SessionError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

/// Process-wide connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
        };
        f.write_str(name)
    }
}

/// Pairing handshake progress
///
/// ```text
/// Unpaired -> AwaitingScan -> Paired
/// Paired -> Resuming -> Paired
/// ```
///
/// A failed scan falls back to `Unpaired`; a failed resume falls back to
/// `Paired`, so the next `connect()` resumes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingState {
    Unpaired,
    AwaitingScan,
    Paired,
    Resuming,
}

impl PairingState {
    /// Resting state for the given credentials
    pub fn resting(paired: bool) -> Self {
        if paired {
            PairingState::Paired
        } else {
            PairingState::Unpaired
        }
    }

    /// Whether a handshake is in flight
    pub fn is_handshaking(self) -> bool {
        matches!(self, PairingState::AwaitingScan | PairingState::Resuming)
    }
}

/// Why and when the session last left `connecting` or `open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastDisconnect {
    /// `None` for a local, orderly `end()`
    pub error: Option<SessionError>,
    pub timestamp: SystemTime,
}

impl LastDisconnect {
    pub fn now(error: Option<SessionError>) -> Self {
        Self {
            error,
            timestamp: SystemTime::now(),
        }
    }
}

/// Opaque pairing code: a random reference plus this client's public noise
/// key, comma separated
pub fn pairing_code(noise_public: Option<&[u8]>) -> String {
    let mut reference = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut reference);

    let mut code = STANDARD.encode(reference);
    if let Some(key) = noise_public {
        code.push(',');
        code.push_str(&STANDARD.encode(key));
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resting_state() {
        assert_eq!(PairingState::resting(true), PairingState::Paired);
        assert_eq!(PairingState::resting(false), PairingState::Unpaired);
        assert!(PairingState::AwaitingScan.is_handshaking());
        assert!(!PairingState::Paired.is_handshaking());
    }

    #[test]
    fn test_pairing_codes_are_fresh() {
        let first = pairing_code(None);
        assert_ne!(first, pairing_code(None));
        assert!(!first.contains(','));
    }

    #[test]
    fn test_pairing_code_carries_public_key() {
        let code = pairing_code(Some(&[7u8; 32]));
        let (_, key) = code.split_once(',').unwrap();
        assert_eq!(STANDARD.decode(key).unwrap(), vec![7u8; 32]);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(
            serde_json::to_string(&ConnectionState::Connecting).unwrap(),
            "\"connecting\""
        );
    }
}
