//! Conversation index maintenance and history loading.

use tracing::{debug, warn};

use spark_shared::{ChatError, Message};

use crate::chat::{parse_user, ChatCore};
use crate::events::CoreUpdate;

impl ChatCore {
    /// Bring the conversation of `message` up to date.
    ///
    /// An existing summary is updated in place.  Otherwise the counterparty
    /// profile is resolved first (one lookup per counterparty, however many
    /// touches are waiting on it) and the summary is created afterwards.
    /// A failed lookup leaves the message in the store without a summary.
    pub(crate) async fn touch(&self, message: &Message) {
        let counterparty = {
            let mut state = self.state();
            let counterparty = message.counterparty(state.local_user()).clone();
            if state.conversations.update_existing(&counterparty, message) {
                drop(state);
                self.emit(CoreUpdate::ConversationsChanged);
                return;
            }
            counterparty
        };

        let lookup = self.inner.services.lookup.clone();
        let key = counterparty.clone();
        let resolved = self
            .inner
            .profiles
            .run(counterparty.clone(), move || async move { lookup.resolve(&key).await })
            .await;

        match resolved {
            Ok(mut profile) => {
                {
                    let mut state = self.state();
                    profile.id = counterparty;
                    if let Some(online) = state.presence_of(&profile.id) {
                        profile.is_online = Some(online);
                    }
                    state.conversations.upsert(profile, message);
                }
                self.emit(CoreUpdate::ConversationsChanged);
            }
            Err(e) => {
                warn!(counterparty = %counterparty.short(), error = %e, "Profile lookup failed, conversation not indexed");
            }
        }
    }

    /// Focus the conversation with `counterparty`: load its history, mark it
    /// read and return the ordered messages.  A failed load drops the focus
    /// again.
    pub async fn open_conversation(&self, counterparty: &str) -> Result<Vec<Message>, ChatError> {
        let counterparty = parse_user(counterparty, "open_conversation")?;
        self.state().active_counterparty = Some(counterparty.clone());

        let api = self.inner.services.api.clone();
        let key = counterparty.clone();
        let history = self
            .inner
            .histories
            .run(counterparty.clone(), move || async move { api.fetch_messages(&key).await })
            .await
            .map_err(|e| {
                warn!(counterparty = %counterparty.short(), error = %e, "History load failed");
                let mut state = self.state();
                if state.active_counterparty.as_ref() == Some(&counterparty) {
                    state.active_counterparty = None;
                }
                e
            })?;

        let changed = {
            let mut state = self.state();
            history
                .into_iter()
                .filter(|m| m.sender == counterparty || m.recipient == counterparty)
                .fold(false, |changed, m| state.messages.ingest(m).changed() || changed)
        };
        debug!(counterparty = %counterparty.short(), changed, "History loaded");
        if changed {
            self.emit(CoreUpdate::MessagesChanged {
                counterparty: counterparty.clone(),
            });
        }

        self.mark_read(&counterparty).await;

        let messages = self.state().messages.list_for(&counterparty).to_vec();
        if let Some(last) = messages.last() {
            self.touch(last).await;
        }
        Ok(messages)
    }

    /// Leave the focused conversation.  Subsequent inbound messages count as
    /// unread again.
    pub fn close_conversation(&self) {
        self.state().active_counterparty = None;
    }

    /// Seed the conversation index from the server's conversation list.
    /// Returns how many new summaries were created.
    pub async fn load_conversations(&self) -> Result<usize, ChatError> {
        let records = self.inner.services.api.fetch_conversations().await.map_err(|e| {
            warn!(error = %e, "Conversation list load failed");
            e
        })?;

        let created = {
            let mut state = self.state();
            let local = state.local_user().clone();
            let known = state.presence.clone();
            let records = records.into_iter().filter_map(|record| {
                let mut profile = record.counterparty;
                if profile.id == local {
                    return None;
                }
                if let Some(online) = known.get(&profile.id) {
                    profile.is_online = Some(*online);
                }
                Some((profile, record.last_message))
            });
            state.conversations.seed(records)
        };
        debug!(created, "Conversation list loaded");
        self.emit(CoreUpdate::ConversationsChanged);
        Ok(created)
    }

    /// Drop the local history with `counterparty`.  The summary stays.
    pub fn clear_conversation(&self, counterparty: &str) -> bool {
        let Ok(counterparty) = parse_user(counterparty, "clear_conversation") else {
            return false;
        };
        let cleared = self.state().messages.clear(&counterparty);
        if cleared {
            self.emit(CoreUpdate::MessagesChanged { counterparty });
        }
        cleared
    }
}
