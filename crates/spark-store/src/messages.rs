use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use spark_shared::{Message, MessageId, UserId};

use crate::models::IngestOutcome;

/// Ordered, deduplicated message histories, one per counterparty.
///
/// Every history is kept sorted non-decreasingly by `created_at`; entries
/// with equal timestamps keep their arrival order.  Within a history no two
/// entries share a server id or a client token.
#[derive(Debug, Clone)]
pub struct MessageStore {
    local_user: UserId,
    histories: HashMap<UserId, Vec<Message>>,
}

impl MessageStore {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            histories: HashMap::new(),
        }
    }

    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Insert `message` unless it is already present.
    ///
    /// A message carrying the client token of an existing entry reconciles
    /// that entry (server id, server timestamp, body) instead of adding a
    /// second one.  `read` only ever moves forward.
    pub fn ingest(&mut self, message: Message) -> IngestOutcome {
        let counterparty = message.counterparty(&self.local_user).clone();
        let history = self.histories.entry(counterparty.clone()).or_default();

        if let Some(id) = &message.id {
            if let Some(existing) = history.iter_mut().find(|m| m.id.as_ref() == Some(id)) {
                existing.read |= message.read;
                trace!(id = %id, "Duplicate message ignored");
                return IngestOutcome::Duplicate;
            }
        }

        if let Some(token) = &message.client_token {
            if let Some(pos) = history
                .iter()
                .position(|m| m.client_token.as_ref() == Some(token))
            {
                let mut existing = history.remove(pos);
                if existing.id.is_some() && message.id.is_some() {
                    // Token matched but both copies already carry server ids.
                    existing.read |= message.read;
                    let at = insert_position(history, &existing);
                    history.insert(at, existing);
                    return IngestOutcome::Duplicate;
                }
                let read = existing.read || message.read;
                existing.id = message.id.or(existing.id);
                existing.created_at = message.created_at;
                existing.body = message.body;
                existing.read = read;
                let at = insert_position(history, &existing);
                history.insert(at, existing);
                debug!(token = %token, counterparty = %counterparty.short(), "Reconciled message");
                return IngestOutcome::Updated;
            }
        }

        let at = insert_position(history, &message);
        history.insert(at, message);
        IngestOutcome::Inserted
    }

    /// Full ordered history held for `counterparty`.
    pub fn list_for(&self, counterparty: &UserId) -> &[Message] {
        self.histories
            .get(counterparty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Set `read = true` on every entry whose id is in `ids`.  Returns how
    /// many entries changed; unknown ids are ignored.
    pub fn mark_read(&mut self, ids: &HashSet<MessageId>) -> usize {
        let mut changed = 0;
        for message in self.histories.values_mut().flatten() {
            let hit = message.id.as_ref().is_some_and(|id| ids.contains(id));
            if hit && !message.read {
                message.read = true;
                changed += 1;
            }
        }
        changed
    }

    /// Mark every inbound message from `counterparty` read.  Returns the
    /// server ids that flipped, for the outbound read receipt.
    pub fn mark_conversation_read(&mut self, counterparty: &UserId) -> Vec<MessageId> {
        let local = self.local_user.clone();
        let Some(history) = self.histories.get_mut(counterparty) else {
            return Vec::new();
        };
        let mut flipped = Vec::new();
        for message in history.iter_mut().filter(|m| m.is_inbound(&local) && !m.read) {
            message.read = true;
            if let Some(id) = &message.id {
                flipped.push(id.clone());
            }
        }
        flipped
    }

    /// Drop the history held for `counterparty`.
    pub fn clear(&mut self, counterparty: &UserId) -> bool {
        self.histories.remove(counterparty).is_some()
    }

    pub fn counterparties(&self) -> impl Iterator<Item = &UserId> {
        self.histories.keys()
    }

    pub fn len(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stable position: after every entry with `created_at <= message.created_at`.
fn insert_position(history: &[Message], message: &Message) -> usize {
    history.partition_point(|m| m.created_at <= message.created_at)
}
