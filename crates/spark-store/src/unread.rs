use std::collections::HashMap;

use spark_shared::{Message, UserId};

/// Per-counterparty unread counters.
///
/// Counters only grow through [`on_inbound_message`](Self::on_inbound_message)
/// and only drop, to zero, through [`mark_all_read`](Self::mark_all_read).
#[derive(Debug, Clone, Default)]
pub struct UnreadTracker {
    counts: HashMap<UserId, u32>,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `message` against its sender unless we sent it or the sender's
    /// conversation is the one currently focused.  The caller must only pass
    /// messages that were actually inserted, so each is counted once.
    pub fn on_inbound_message(
        &mut self,
        message: &Message,
        local_user: &UserId,
        active_counterparty: Option<&UserId>,
    ) -> bool {
        if &message.sender == local_user || Some(&message.sender) == active_counterparty {
            return false;
        }
        let count = self.counts.entry(message.sender.clone()).or_insert(0);
        *count = count.saturating_add(1);
        true
    }

    pub fn mark_all_read(&mut self, counterparty: &UserId) {
        self.counts.remove(counterparty);
    }

    pub fn count(&self, counterparty: &UserId) -> u32 {
        self.counts.get(counterparty).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().fold(0u32, |acc, c| acc.saturating_add(*c))
    }
}
