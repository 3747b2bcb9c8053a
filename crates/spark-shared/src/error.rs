use thiserror::Error;

use crate::identity::UserId;
use crate::types::MessageKind;

/// Malformed id or argument. Logged at the core boundary, no state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("Message kind {0} cannot be sent")]
    UnsupportedKind(MessageKind),

    #[error("Message body must not be empty")]
    EmptyBody,

    #[error("Message body does not match kind {0}")]
    BodyMismatch(MessageKind),
}

/// Push channel unavailable or unresponsive. Triggers the API fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Push transport is disconnected")]
    Disconnected,

    #[error("Push transport did not answer within {0} ms")]
    Timeout(u64),

    #[error("Push transport closed")]
    Closed,

    #[error("Push transport rejected the event: {0}")]
    Rejected(String),

    #[error("Malformed push acknowledgement: {0}")]
    Malformed(String),
}

/// Request/response API failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Server returned status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Server rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Attachment validation or upload failure. Aborts a send before any
/// message exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("File type not allowed: {0}")]
    UnsupportedType(String),

    #[error("File is empty")]
    Empty,

    #[error("Upload failed: {0}")]
    Failed(String),
}

/// Call lifecycle failure. Signaling failures force the session back to idle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("User {0} is offline")]
    CounterpartyOffline(UserId),

    #[error("Cannot {action} while call is {status}")]
    InvalidState {
        action: &'static str,
        status: &'static str,
    },

    #[error("Call signaling failed: {0}")]
    Signaling(String),
}

/// Outcome of a failed `send` / `send_file`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Umbrella error for conversation-level operations (history, list loads).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Call(#[from] CallError),
}

impl From<SendError> for ChatError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Validation(e) => ChatError::Validation(e),
            SendError::Api(e) => ChatError::Api(e),
            SendError::Upload(e) => ChatError::Upload(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons_are_human_readable() {
        let err = SendError::from(UploadError::TooLarge {
            size: 6 * 1024 * 1024,
            max: 5 * 1024 * 1024,
        });
        assert_eq!(err.to_string(), "File too large: 6291456 bytes (max 5242880)");

        let err = CallError::InvalidState {
            action: "answer",
            status: "idle",
        };
        assert_eq!(err.to_string(), "Cannot answer while call is idle");
    }

    #[test]
    fn test_send_error_widens_into_chat_error() {
        let err: ChatError = SendError::Api(ApiError::Rejected("nope".into())).into();
        assert_eq!(err, ChatError::Api(ApiError::Rejected("nope".into())));
    }
}
