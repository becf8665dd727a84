//! Identity (JID) Rules
//!
//! Pure classification and formatting of addressable identities of the form
//! `user[.device]@server`.
//!
//! - `s.whatsapp.net` addresses a user (optionally one of their devices)
//! - `g.us` addresses a group
//! - `broadcast` addresses a broadcast list (including `status@broadcast`)
//!
//! Anything else is not an identity this client can address. Callers holding a
//! raw string should go through [`is_valid_identity`] or [`Jid::from_str`]
//! before using it in an outbound operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server part for user identities
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server part for group identities
pub const GROUP_SERVER: &str = "g.us";

/// Server part for broadcast identities
pub const BROADCAST_SERVER: &str = "broadcast";

/// Identity parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidError {
    #[error("identity must contain exactly one '@': {0}")]
    Malformed(String),

    #[error("identity has an empty user part: {0}")]
    EmptyUser(String),

    #[error("unknown identity server '{server}' in {jid}")]
    UnknownServer { jid: String, server: String },

    #[error("not a phone number: {0}")]
    NotAPhoneNumber(String),
}

/// The three kinds of addressable identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JidKind {
    User,
    Group,
    Broadcast,
}

impl JidKind {
    /// Server string used for this kind
    pub fn server(self) -> &'static str {
        match self {
            JidKind::User => USER_SERVER,
            JidKind::Group => GROUP_SERVER,
            JidKind::Broadcast => BROADCAST_SERVER,
        }
    }

    fn from_server(server: &str) -> Option<Self> {
        match server {
            USER_SERVER => Some(JidKind::User),
            GROUP_SERVER => Some(JidKind::Group),
            BROADCAST_SERVER => Some(JidKind::Broadcast),
            _ => None,
        }
    }
}

impl fmt::Display for JidKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JidKind::User => "user",
            JidKind::Group => "group",
            JidKind::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// A well-formed, classified identity
///
/// Construction always goes through parsing, so every `Jid` value classifies
/// as exactly one [`JidKind`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    user: String,
    device: Option<String>,
    kind: JidKind,
}

/// Decomposed identity, as returned by [`Jid::parts`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JidParts<'a> {
    pub server: &'static str,
    pub user: &'a str,
    pub device: Option<&'a str>,
}

impl Jid {
    /// Build a user identity from a user part
    pub fn user(user: impl Into<String>) -> Result<Self, JidError> {
        Self::from_parts(user, None, JidKind::User)
    }

    /// Build a group identity from a group id
    pub fn group(id: impl Into<String>) -> Result<Self, JidError> {
        Self::from_parts(id, None, JidKind::Group)
    }

    /// Build an identity from its parts
    pub fn from_parts(
        user: impl Into<String>,
        device: Option<String>,
        kind: JidKind,
    ) -> Result<Self, JidError> {
        let user = user.into();
        if user.is_empty() {
            return Err(JidError::EmptyUser(format!("@{}", kind.server())));
        }
        // '.' separates the device suffix
        if user.contains('@') || user.contains('.') {
            return Err(JidError::Malformed(user));
        }
        if let Some(d) = device.as_deref().filter(|d| d.contains('@')) {
            return Err(JidError::Malformed(d.to_string()));
        }
        Ok(Self {
            user,
            device: device.filter(|d| !d.is_empty()),
            kind,
        })
    }

    pub fn kind(&self) -> JidKind {
        self.kind
    }

    pub fn is_user(&self) -> bool {
        self.kind == JidKind::User
    }

    pub fn is_group(&self) -> bool {
        self.kind == JidKind::Group
    }

    pub fn is_broadcast(&self) -> bool {
        self.kind == JidKind::Broadcast
    }

    /// User part without the device suffix
    pub fn user_part(&self) -> &str {
        &self.user
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn server(&self) -> &'static str {
        self.kind.server()
    }

    /// Decompose into `{server, user, device}`
    pub fn parts(&self) -> JidParts<'_> {
        JidParts {
            server: self.server(),
            user: &self.user,
            device: self.device(),
        }
    }

    /// Same identity with the device suffix removed
    pub fn to_non_device(&self) -> Jid {
        Jid {
            user: self.user.clone(),
            device: None,
            kind: self.kind,
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut halves = s.split('@');
        let (user_and_device, server) = match (halves.next(), halves.next(), halves.next()) {
            (Some(left), Some(right), None) => (left, right),
            _ => return Err(JidError::Malformed(s.to_string())),
        };

        let kind = JidKind::from_server(server).ok_or_else(|| JidError::UnknownServer {
            jid: s.to_string(),
            server: server.to_string(),
        })?;

        let (user, device) = match user_and_device.split_once('.') {
            Some((user, device)) => (user, Some(device.to_string())),
            None => (user_and_device, None),
        };
        if user.is_empty() {
            return Err(JidError::EmptyUser(s.to_string()));
        }

        Jid::from_parts(user, device, kind)
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{}.{}@{}", self.user, device, self.server()),
            None => write!(f, "{}@{}", self.user, self.server()),
        }
    }
}

/// Whether `raw` is a well-formed identity that classifies
pub fn is_valid_identity(raw: &str) -> bool {
    raw.parse::<Jid>().is_ok()
}

/// Classify a raw identity string
pub fn classify_identity(raw: &str) -> Result<JidKind, JidError> {
    raw.parse::<Jid>().map(|jid| jid.kind())
}

/// Format a phone-number-like string into a user identity
///
/// Every non-digit character is stripped: `"+1 (555) 010-0000"` becomes
/// `15550100000@s.whatsapp.net`.
pub fn format_phone_number(phone: &str) -> Result<Jid, JidError> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(JidError::NotAPhoneNumber(phone.to_string()));
    }
    Jid::user(digits)
}

/// Resolve a CLI-style recipient: a full identity, or a phone number
pub fn resolve_recipient(raw: &str) -> Result<Jid, JidError> {
    if raw.contains('@') {
        raw.parse()
    } else {
        format_phone_number(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_user_group_broadcast() {
        assert_eq!(
            classify_identity("15550100000@s.whatsapp.net").unwrap(),
            JidKind::User
        );
        assert_eq!(
            classify_identity("120363025246125486@g.us").unwrap(),
            JidKind::Group
        );
        assert_eq!(
            classify_identity("status@broadcast").unwrap(),
            JidKind::Broadcast
        );
    }

    #[test]
    fn test_rejects_identity_without_separator() {
        assert!(!is_valid_identity("not-an-identity"));
        assert!(matches!(
            "not-an-identity".parse::<Jid>(),
            Err(JidError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_multiple_separators() {
        assert!(matches!(
            "a@b@s.whatsapp.net".parse::<Jid>(),
            Err(JidError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_server() {
        let err = "user@example.com".parse::<Jid>().unwrap_err();
        assert!(matches!(err, JidError::UnknownServer { ref server, .. } if server == "example.com"));
    }

    #[test]
    fn test_rejects_empty_user() {
        assert!(matches!(
            "@s.whatsapp.net".parse::<Jid>(),
            Err(JidError::EmptyUser(_))
        ));
    }

    #[test]
    fn test_decompose_with_device() {
        let jid: Jid = "15550100000.3@s.whatsapp.net".parse().unwrap();
        let parts = jid.parts();
        assert_eq!(parts.server, USER_SERVER);
        assert_eq!(parts.user, "15550100000");
        assert_eq!(parts.device, Some("3"));
        assert_eq!(jid.to_string(), "15550100000.3@s.whatsapp.net");
        assert_eq!(
            jid.to_non_device().to_string(),
            "15550100000@s.whatsapp.net"
        );
    }

    #[test]
    fn test_decompose_without_device() {
        let jid: Jid = "15550100000@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.device(), None);
        assert_eq!(jid.user_part(), "15550100000");
    }

    #[test]
    fn test_format_phone_number() {
        let jid = format_phone_number("+1 (555) 010-0000").unwrap();
        assert_eq!(jid.to_string(), "15550100000@s.whatsapp.net");
        assert!(jid.is_user());
    }

    #[test]
    fn test_format_phone_number_without_digits() {
        assert!(matches!(
            format_phone_number("call me"),
            Err(JidError::NotAPhoneNumber(_))
        ));
    }

    #[test]
    fn test_resolve_recipient() {
        assert!(resolve_recipient("123@g.us").unwrap().is_group());
        assert!(resolve_recipient("+44 7911 123456").unwrap().is_user());
    }

    #[test]
    fn test_serde_as_string() {
        let jid: Jid = "123@g.us".parse().unwrap();
        let json = serde_json::to_string(&jid).unwrap();
        assert_eq!(json, "\"123@g.us\"");
        let back: Jid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, jid);
        assert!(serde_json::from_str::<Jid>("\"nobody\"").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn kind_strategy() -> impl Strategy<Value = JidKind> {
        prop_oneof![
            Just(JidKind::User),
            Just(JidKind::Group),
            Just(JidKind::Broadcast),
        ]
    }

    proptest! {
        #[test]
        fn prop_well_formed_identity_round_trips(
            user in "[0-9a-zA-Z_-]{1,20}",
            device in proptest::option::of("[0-9]{1,3}"),
            kind in kind_strategy(),
        ) {
            let raw = match &device {
                Some(d) => format!("{}.{}@{}", user, d, kind.server()),
                None => format!("{}@{}", user, kind.server()),
            };

            let jid: Jid = raw.parse().unwrap();
            prop_assert_eq!(jid.kind(), kind);

            let parts = jid.parts();
            let rebuilt = Jid::from_parts(
                parts.user,
                parts.device.map(str::to_string),
                kind,
            ).unwrap();
            prop_assert_eq!(rebuilt.to_string(), raw);
        }

        #[test]
        fn prop_strings_without_separator_never_classify(raw in "[^@]{0,40}") {
            prop_assert!(!is_valid_identity(&raw));
        }
    }
}
