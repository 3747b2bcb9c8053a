//! Opaque identifiers and the identity validator.
//!
//! Users and messages are addressed by 12-byte object ids whose textual form
//! is 24 hexadecimal characters.  Parsing is case-insensitive; rendering is
//! always lowercase so that ids compare equal regardless of how the server
//! spelled them.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{CLIENT_TOKEN_SUFFIX_LEN, OBJECT_ID_HEX_LEN, OBJECT_ID_SIZE};
use crate::error::ValidationError;

/// Returns `true` iff `value` is a 24-character string of hex digits.
pub fn is_valid_id(value: &str) -> bool {
    value.len() == OBJECT_ID_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn decode_object_id(kind: &'static str, value: &str) -> Result<[u8; OBJECT_ID_SIZE], ValidationError> {
    if !is_valid_id(value) {
        return Err(ValidationError::InvalidId {
            kind,
            value: value.to_string(),
        });
    }
    let mut bytes = [0u8; OBJECT_ID_SIZE];
    hex::decode_to_slice(value, &mut bytes).map_err(|_| ValidationError::InvalidId {
        kind,
        value: value.to_string(),
    })?;
    Ok(bytes)
}

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; OBJECT_ID_SIZE]);

        impl $name {
            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                decode_object_id($kind, value).map(Self)
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// First 8 hex chars, for log lines.
            pub fn short(&self) -> String {
                self.to_hex()[..8].to_string()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_hex()
            }
        }
    };
}

object_id!(
    /// A user (or counterparty) identifier.
    UserId,
    "user"
);

object_id!(
    /// A server-assigned message identifier.
    MessageId,
    "message"
);

/// Client-generated idempotency key attached to every outbound message.
///
/// Used to reconcile a locally sent message with its server echo when the
/// same logical message arrives over both the push transport and the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(pub String);

impl ClientToken {
    /// `<unix millis>-<random alphanumerics>`.
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CLIENT_TOKEN_SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!("{}-{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("507f1f77bcf86cd799439011"));
        assert!(is_valid_id("507F1F77BCF86CD799439011"));
        assert!(!is_valid_id("507f1f77bcf86cd79943901"));
        assert!(!is_valid_id("507f1f77bcf86cd7994390111"));
        assert!(!is_valid_id("507f1f77bcf86cd79943901z"));
        assert!(!is_valid_id(""));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let lower = UserId::parse("507f1f77bcf86cd799439011").unwrap();
        let upper = UserId::parse("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), "507f1f77bcf86cd799439011");
        assert_eq!(upper.short(), "507f1f77");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let err = MessageId::parse("not-an-id").unwrap_err();
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn test_serde_as_string() {
        let id = UserId::parse("aaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"aaaaaaaaaaaaaaaaaaaaaaaa\"");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<UserId>("\"xyz\"").is_err());
    }

    #[test]
    fn test_client_tokens_are_distinct() {
        let tokens: HashSet<ClientToken> = (0..500).map(|_| ClientToken::generate()).collect();
        assert_eq!(tokens.len(), 500);
        let sample = ClientToken::generate();
        let (millis, suffix) = sample.as_str().split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), CLIENT_TOKEN_SUFFIX_LEN);
    }
}
