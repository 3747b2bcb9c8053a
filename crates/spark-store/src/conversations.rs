use tracing::debug;

use spark_shared::{Message, UserId, UserProfile};

use crate::models::ConversationSummary;

/// One summary per counterparty, most recently updated first.
#[derive(Debug, Clone, Default)]
pub struct ConversationIndex {
    summaries: Vec<ConversationSummary>,
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counterparty: &UserId) -> Option<&ConversationSummary> {
        self.summaries
            .iter()
            .find(|s| s.counterparty_id() == counterparty)
    }

    pub fn contains(&self, counterparty: &UserId) -> bool {
        self.get(counterparty).is_some()
    }

    /// Apply `message` to an existing summary.  Returns `false` when no
    /// summary exists yet; the caller then resolves the profile and calls
    /// [`upsert`](Self::upsert).
    pub fn update_existing(&mut self, counterparty: &UserId, message: &Message) -> bool {
        let Some(summary) = self
            .summaries
            .iter_mut()
            .find(|s| s.counterparty_id() == counterparty)
        else {
            return false;
        };
        if summary.apply(message) {
            self.resort();
        }
        true
    }

    /// Insert a summary once the counterparty profile is resolved.
    ///
    /// Check-before-insert: if another resolution already created the
    /// summary, the newer profile snapshot replaces the old one and the
    /// message is applied only if it moves the conversation forward.
    /// Returns `true` when a new summary was created.
    pub fn upsert(&mut self, profile: UserProfile, message: &Message) -> bool {
        if let Some(summary) = self
            .summaries
            .iter_mut()
            .find(|s| s.counterparty_id() == &profile.id)
        {
            summary.counterparty = profile;
            summary.apply(message);
            self.resort();
            return false;
        }
        debug!(counterparty = %profile.id.short(), "New conversation");
        self.summaries
            .push(ConversationSummary::new(profile, message.clone()));
        self.resort();
        true
    }

    /// Update the online flag of the embedded profile.  No-op if absent.
    pub fn set_presence(&mut self, counterparty: &UserId, is_online: bool) -> bool {
        match self
            .summaries
            .iter_mut()
            .find(|s| s.counterparty_id() == counterparty)
        {
            Some(summary) => {
                summary.counterparty.is_online = Some(is_online);
                true
            }
            None => false,
        }
    }

    /// Bulk-load summaries, e.g. from the REST conversation list.
    /// Returns how many new summaries were created.
    pub fn seed<I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = (UserProfile, Message)>,
    {
        records
            .into_iter()
            .filter(|(profile, message)| self.upsert(profile.clone(), message))
            .count()
    }

    pub fn list(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    fn resort(&mut self) {
        // Stable: equal timestamps keep their relative order.
        self.summaries
            .sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    }
}
