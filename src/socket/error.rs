//! Session error taxonomy.

use crate::codec::CodecError;
use crate::jid::JidError;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session errors
///
/// Caller errors (`InvalidIdentity`, `NotConnected`, `InvalidContent`,
/// `InvalidRequest`) only fail the call that produced them. `ConnectTimeout`
/// and `Transport` also close the session and are broadcast through
/// `lastDisconnect`. `Persistence` is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("not connected")]
    NotConnected,

    #[error("timed out waiting for pairing or resume")]
    ConnectTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("credential persistence failed: {0}")]
    Persistence(String),

    #[error("connection closed before it opened")]
    ConnectionClosed,

    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("invalid message content: {0}")]
    InvalidContent(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("timed out waiting for a response")]
    QueryTimeout,

    #[error("server rejected request ({code}): {text}")]
    Server { code: u16, text: String },

    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

impl SessionError {
    /// Whether retrying the same request can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}

impl From<JidError> for SessionError {
    fn from(err: JidError) -> Self {
        SessionError::InvalidIdentity(err.to_string())
    }
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        SessionError::InvalidContent(err.to_string())
    }
}

impl From<super::traits::TransportError> for SessionError {
    fn from(err: super::traits::TransportError) -> Self {
        SessionError::Transport(err.to_string())
    }
}

impl From<crate::auth::StoreError> for SessionError {
    fn from(err: crate::auth::StoreError) -> Self {
        SessionError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_errors_map_to_invalid_identity() {
        let err: SessionError = "nobody".parse::<crate::jid::Jid>().unwrap_err().into();
        assert!(matches!(err, SessionError::InvalidIdentity(_)));
    }

    #[test]
    fn test_transient_errors() {
        assert!(SessionError::Transport("reset".into()).is_transient());
        assert!(!SessionError::QueryTimeout.is_transient());
        assert!(!SessionError::NotConnected.is_transient());
        assert!(!SessionError::Server {
            code: 403,
            text: "forbidden".into()
        }
        .is_transient());
    }
}
