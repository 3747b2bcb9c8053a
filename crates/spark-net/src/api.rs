//! Request/response collaborator seams.

use std::sync::Arc;

use async_trait::async_trait;

use spark_shared::protocol::{ConversationRecord, OutgoingMessage};
use spark_shared::{ApiError, Message, MessageId, OutgoingFile, UploadError, UploadProgress, UserId, UserProfile};

/// Upload progress callback.
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Conversation and message endpoints.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Persist an outbound message; the server echoes the stored copy.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, ApiError>;

    /// Full history with `counterparty`.
    async fn fetch_messages(&self, counterparty: &UserId) -> Result<Vec<Message>, ApiError>;

    /// Conversation list of the signed-in user.
    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, ApiError>;

    /// Read receipt for messages received from `counterparty`.
    async fn mark_read(&self, counterparty: &UserId, ids: &[MessageId]) -> Result<(), ApiError>;
}

/// Attachment storage.
#[async_trait]
pub trait UploadClient: Send + Sync {
    async fn upload(
        &self,
        file: OutgoingFile,
        progress: ProgressFn,
    ) -> Result<spark_shared::FileAttachment, UploadError>;
}

/// Resolves user ids to profile snapshots.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn resolve(&self, id: &UserId) -> Result<UserProfile, ApiError>;
}
