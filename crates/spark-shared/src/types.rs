use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{ClientToken, MessageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Text,
    Wink,
    VideoEvent,
    File,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Wink => "wink",
            Self::VideoEvent => "video-event",
            Self::File => "file",
            Self::System => "system",
        }
    }

    /// Kinds a client is allowed to originate.
    pub fn is_sendable(&self) -> bool {
        !matches!(self, Self::System)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored-object descriptor returned by the upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub url: String,
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
}

/// Kind-dependent payload: plain text for text/wink/video-event/system,
/// attachment metadata for file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    File(FileAttachment),
}

impl MessageBody {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::File(_) => None,
        }
    }

    pub fn attachment(&self) -> Option<&FileAttachment> {
        match self {
            Self::Text(_) => None,
            Self::File(f) => Some(f),
        }
    }
}

impl From<&str> for MessageBody {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageBody {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A chat message as held by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned id; absent until acknowledged.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<ClientToken>,
    pub sender: UserId,
    pub recipient: UserId,
    #[serde(rename = "type", alias = "kind")]
    pub kind: MessageKind,
    #[serde(alias = "content")]
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    /// Whichever of sender/recipient is not `local`.
    pub fn counterparty(&self, local: &UserId) -> &UserId {
        if &self.sender == local {
            &self.recipient
        } else {
            &self.sender
        }
    }

    pub fn is_inbound(&self, local: &UserId) -> bool {
        &self.sender != local
    }

    /// Same logical message: equal server ids, or equal client tokens.
    pub fn same_identity(&self, other: &Message) -> bool {
        let same_id = matches!((&self.id, &other.id), (Some(a), Some(b)) if a == b);
        let same_token =
            matches!((&self.client_token, &other.client_token), (Some(a), Some(b)) if a == b);
        same_id || same_token
    }
}

/// Denormalized counterparty profile snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub photos: Vec<String>,
    /// `None` when the server did not say.
    #[serde(default)]
    pub is_online: Option<bool>,
    /// Fields the core does not interpret, kept for the render layer.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    pub fn new(id: UserId, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            photos: Vec::new(),
            is_online: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A file picked by the user, before upload.
#[derive(Debug, Clone)]
pub struct OutgoingFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl OutgoingFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Upload progress relayed verbatim to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.sent.min(self.total) * 100) / self.total) as u8
    }
}
