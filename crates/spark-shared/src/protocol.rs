//! Wire payloads exchanged with the push transport and the REST API.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::identity::{ClientToken, MessageId, UserId};
use crate::types::{Message, MessageBody, MessageKind, UserProfile};

// Inbound push events
pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_TYPING: &str = "typing";
pub const EVENT_USER_ONLINE: &str = "user-online";
pub const EVENT_USER_OFFLINE: &str = "user-offline";
pub const EVENT_MESSAGES_READ: &str = "messages-read";
pub const EVENT_INCOMING_CALL: &str = "incoming-call";
pub const EVENT_CALL_ANSWERED: &str = "call-answered";
pub const EVENT_CALL_ENDED: &str = "call-ended";
pub const EVENT_CALL_REJECTED: &str = "call-rejected";

/// Every inbound event the router subscribes to.
pub const INBOUND_EVENTS: &[&str] = &[
    EVENT_NEW_MESSAGE,
    EVENT_TYPING,
    EVENT_USER_ONLINE,
    EVENT_USER_OFFLINE,
    EVENT_MESSAGES_READ,
    EVENT_INCOMING_CALL,
    EVENT_CALL_ANSWERED,
    EVENT_CALL_ENDED,
    EVENT_CALL_REJECTED,
];

// Outbound push events
pub const EMIT_SEND_MESSAGE: &str = "send-message";
pub const EMIT_TYPING: &str = "typing";
pub const EMIT_CALL_USER: &str = "call-user";
pub const EMIT_ANSWER_CALL: &str = "answer-call";
pub const EMIT_REJECT_CALL: &str = "reject-call";
pub const EMIT_END_CALL: &str = "end-call";

/// Body of an outbound message, identical on the push and API paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub recipient: UserId,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub body: MessageBody,
    pub client_token: ClientToken,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Acknowledgement returned by the push transport for `send-message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAck {
    #[serde(default)]
    pub success: bool,
    /// Server queued the message without confirming it.
    #[serde(default)]
    pub pending: bool,
    #[serde(default, alias = "data")]
    pub message: Option<Message>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PushAck {
    /// The acknowledged message, when the ack is authoritative.
    pub fn into_accepted(self) -> Option<Message> {
        if self.success && !self.pending {
            self.message
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(alias = "senderId")]
    pub from: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    #[serde(alias = "id")]
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptPayload {
    #[serde(alias = "readBy")]
    pub reader: UserId,
    pub message_ids: Vec<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallPayload {
    pub call_id: String,
    pub from: UserId,
    pub peer_id: String,
    #[serde(default)]
    pub caller: Option<UserProfile>,
    #[serde(default)]
    pub video: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnsweredPayload {
    pub call_id: String,
    pub peer_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallClosedPayload {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One entry of the REST conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    #[serde(alias = "user")]
    pub counterparty: UserProfile,
    pub last_message: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptRequest {
    pub counterparty: UserId,
    pub message_ids: Vec<MessageId>,
}

/// `{success, data | error}` envelope used by every REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.error.unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ApiError::Decode("missing data field".to_string()))
    }

    /// For endpoints whose `data` carries nothing the client needs.
    pub fn into_ack(self) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                self.error.unwrap_or_else(|| "request was not successful".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_ack_pending_is_not_authoritative() {
        let ack: PushAck = serde_json::from_value(serde_json::json!({
            "success": true,
            "pending": true
        }))
        .unwrap();
        assert!(ack.into_accepted().is_none());
    }

    #[test]
    fn test_push_ack_accepted() {
        let ack: PushAck = serde_json::from_value(serde_json::json!({
            "success": true,
            "data": {
                "_id": "0123456789abcdef01234567",
                "sender": "aaaaaaaaaaaaaaaaaaaaaaaa",
                "recipient": "bbbbbbbbbbbbbbbbbbbbbbbb",
                "type": "wink",
                "body": "😉",
                "createdAt": "2024-05-01T10:00:00Z"
            }
        }))
        .unwrap();
        let msg = ack.into_accepted().expect("authoritative ack");
        assert_eq!(msg.kind, MessageKind::Wink);
    }

    #[test]
    fn test_api_envelope() {
        let ok: ApiResponse<u32> = serde_json::from_str(r#"{"success":true,"data":7}"#).unwrap();
        assert_eq!(ok.into_result(), Ok(7));

        let rejected: ApiResponse<u32> =
            serde_json::from_str(r#"{"success":false,"error":"blocked"}"#).unwrap();
        assert_eq!(
            rejected.into_result(),
            Err(ApiError::Rejected("blocked".to_string()))
        );

        let empty: ApiResponse<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(empty.into_result(), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_outgoing_message_shape() {
        let msg = OutgoingMessage {
            recipient: UserId::parse("bbbbbbbbbbbbbbbbbbbbbbbb").unwrap(),
            kind: MessageKind::Text,
            body: "Hello".into(),
            client_token: ClientToken("1-abc".into()),
            metadata: serde_json::Map::new(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["clientToken"], "1-abc");
        assert!(value.get("metadata").is_none());
    }
}
