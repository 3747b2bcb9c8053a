//! Records held by the in-memory store and handed to the render layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use spark_shared::{Message, UserId, UserProfile};

/// Outcome of [`MessageStore::ingest`](crate::MessageStore::ingest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new entry was added.
    Inserted,
    /// An optimistic entry was reconciled with its server copy.
    Updated,
    /// The message was already present.
    Duplicate,
}

impl IngestOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted)
    }

    /// Whether the visible history changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// One conversation row: the counterparty, the latest message and when the
/// conversation last moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterparty: UserProfile,
    pub last_message: Message,
    pub last_updated: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(counterparty: UserProfile, last_message: Message) -> Self {
        Self {
            last_updated: last_message.created_at,
            counterparty,
            last_message,
        }
    }

    pub fn counterparty_id(&self) -> &UserId {
        &self.counterparty.id
    }

    /// Moves the summary to `message` when it is at least as recent, or when
    /// it is the same logical message coming back acknowledged.
    /// `last_updated` never moves backwards.
    pub fn apply(&mut self, message: &Message) -> bool {
        if message.same_identity(&self.last_message) {
            // An echo without a server id must not erase the one we hold.
            let id = message.id.clone().or_else(|| self.last_message.id.take());
            self.last_message = message.clone();
            self.last_message.id = id;
            if message.created_at > self.last_updated {
                self.last_updated = message.created_at;
            }
            return true;
        }
        if message.created_at >= self.last_updated {
            self.last_message = message.clone();
            self.last_updated = message.created_at;
            return true;
        }
        false
    }
}
