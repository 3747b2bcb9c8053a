//! Mutable state of the chat core.
//!
//! [`CoreState`] sits behind a single `std::sync::Mutex` in
//! [`ChatCore`](crate::ChatCore).  The lock is only ever held for
//! synchronous sections; no guard lives across an `.await`.

use std::collections::HashMap;

use serde::Serialize;

use spark_call::{CallSession, CallSnapshot};
use spark_shared::{MessageId, UserId};
use spark_store::{ConversationIndex, ConversationSummary, MessageStore, TypingTracker, UnreadTracker};

pub struct CoreState {
    pub messages: MessageStore,
    pub conversations: ConversationIndex,
    pub unread: UnreadTracker,
    pub typing: TypingTracker,
    pub call: CallSession,

    /// Conversation currently open in the UI.  Inbound messages from this
    /// counterparty are not counted as unread.
    pub active_counterparty: Option<UserId>,

    /// Last presence reported for each user.  Absent means unknown.
    pub presence: HashMap<UserId, bool>,

    /// Messages marked read locally whose receipt has not reached the
    /// server yet.
    pub receipts_due: HashMap<UserId, Vec<MessageId>>,
}

impl CoreState {
    pub fn new(local_user: UserId) -> Self {
        Self {
            messages: MessageStore::new(local_user),
            conversations: ConversationIndex::new(),
            unread: UnreadTracker::new(),
            typing: TypingTracker::new(),
            call: CallSession::new(),
            active_counterparty: None,
            presence: HashMap::new(),
            receipts_due: HashMap::new(),
        }
    }

    pub fn local_user(&self) -> &UserId {
        self.messages.local_user()
    }

    /// Last known presence: a presence event if one arrived, else the
    /// online flag of the indexed profile snapshot.  `None` when unknown.
    pub fn presence_of(&self, user: &UserId) -> Option<bool> {
        self.presence.get(user).copied().or_else(|| {
            self.conversations
                .get(user)
                .and_then(|summary| summary.counterparty.is_online)
        })
    }

    /// Queue `ids` for the next receipt to `counterparty`.
    pub fn queue_receipt(&mut self, counterparty: &UserId, ids: impl IntoIterator<Item = MessageId>) {
        for id in ids {
            let due = self.receipts_due.entry(counterparty.clone()).or_default();
            if !due.contains(&id) {
                due.push(id);
            }
        }
    }

    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            local_user: self.local_user().clone(),
            conversations: self.conversations.list().to_vec(),
            unread_total: self.unread.total(),
            active_counterparty: self.active_counterparty.clone(),
            call: self.call.snapshot(),
        }
    }
}

/// Everything the conversation list screen needs in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreSnapshot {
    pub local_user: UserId,
    pub conversations: Vec<ConversationSummary>,
    pub unread_total: u32,
    pub active_counterparty: Option<UserId>,
    pub call: CallSnapshot,
}
