//! Inbound push events.
//!
//! [`TransportEventRouter`] owns the transport subscriptions.  Handlers run
//! on whatever thread the transport delivers from, so they only decode the
//! payload and queue an [`InboundEvent`]; a pump task applies queued events
//! to the core one at a time, in arrival order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use spark_net::{EventHandler, PushTransport, SubscriptionId};
use spark_shared::protocol::*;
use spark_shared::{Message, MessageId, TransportError, UserId};

use crate::chat::ChatCore;
use crate::events::CoreUpdate;

/// A decoded inbound push event.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    NewMessage(Message),
    Typing(TypingPayload),
    UserOnline(UserId),
    UserOffline(UserId),
    MessagesRead(ReadReceiptPayload),
    IncomingCall(IncomingCallPayload),
    CallAnswered(CallAnsweredPayload),
    CallEnded(CallClosedPayload),
    CallRejected(CallClosedPayload),
}

impl InboundEvent {
    pub fn decode(event: &str, payload: Value) -> Result<Self, TransportError> {
        Ok(match event {
            EVENT_NEW_MESSAGE => Self::NewMessage(decode_message(payload)?),
            EVENT_TYPING => Self::Typing(decode(payload)?),
            EVENT_USER_ONLINE => Self::UserOnline(decode_user(payload)?),
            EVENT_USER_OFFLINE => Self::UserOffline(decode_user(payload)?),
            EVENT_MESSAGES_READ => Self::MessagesRead(decode(payload)?),
            EVENT_INCOMING_CALL => Self::IncomingCall(decode(payload)?),
            EVENT_CALL_ANSWERED => Self::CallAnswered(decode(payload)?),
            EVENT_CALL_ENDED => Self::CallEnded(decode_closed(payload)?),
            EVENT_CALL_REJECTED => Self::CallRejected(decode_closed(payload)?),
            other => return Err(TransportError::Malformed(format!("unknown event {other}"))),
        })
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, TransportError> {
    serde_json::from_value(payload).map_err(|e| TransportError::Malformed(e.to_string()))
}

/// The message itself, or wrapped as `{ "message": ... }`.
fn decode_message(payload: Value) -> Result<Message, TransportError> {
    match payload {
        Value::Object(mut map) if map.contains_key("message") && !map.contains_key("sender") => {
            decode(map.remove("message").unwrap_or(Value::Null))
        }
        other => decode(other),
    }
}

/// A presence payload, or the bare user id string.
fn decode_user(payload: Value) -> Result<UserId, TransportError> {
    match payload {
        Value::String(id) => UserId::parse(&id).map_err(|e| TransportError::Malformed(e.to_string())),
        other => decode::<PresencePayload>(other).map(|p| p.user_id),
    }
}

/// Close events may come without any payload.
fn decode_closed(payload: Value) -> Result<CallClosedPayload, TransportError> {
    match payload {
        Value::Null => Ok(CallClosedPayload::default()),
        other => decode(other),
    }
}

pub struct TransportEventRouter {
    transport: Arc<dyn PushTransport>,
    subscriptions: Vec<SubscriptionId>,
    pump: Option<JoinHandle<()>>,
}

impl TransportEventRouter {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self {
            transport,
            subscriptions: Vec::new(),
            pump: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.pump.is_some()
    }

    /// Subscribe to every inbound event and start feeding `core`.
    /// Must be called from within a tokio runtime.  Returns `false` if
    /// already attached.
    pub fn attach(&mut self, core: &ChatCore) -> bool {
        if self.is_attached() {
            debug!("Event router already attached");
            return false;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        for &event in INBOUND_EVENTS {
            let tx = tx.clone();
            let handler: EventHandler = Arc::new(move |payload: Value| match InboundEvent::decode(event, payload) {
                Ok(inbound) => {
                    if tx.send(inbound).is_err() {
                        trace!(event, "Event router stopped, dropping event");
                    }
                }
                Err(e) => warn!(event, error = %e, "Dropping malformed event"),
            });
            self.subscriptions.push(self.transport.on(event, handler));
        }

        let core = core.clone();
        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                core.handle_event(event).await;
            }
        }));
        debug!(subscriptions = self.subscriptions.len(), "Event router attached");
        true
    }

    /// Remove every subscription and stop the pump.  Idempotent.
    pub fn detach(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.transport.off(id);
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
            debug!("Event router detached");
        }
    }
}

impl Drop for TransportEventRouter {
    fn drop(&mut self) {
        self.detach();
    }
}

impl ChatCore {
    /// A router over this core's push transport.
    pub fn event_router(&self) -> TransportEventRouter {
        TransportEventRouter::new(self.inner.services.transport.clone())
    }

    /// Apply one inbound event.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::NewMessage(message) => self.on_new_message(message).await,
            InboundEvent::Typing(payload) => self.on_typing(payload.from),
            InboundEvent::UserOnline(user) => self.on_presence(user, true),
            InboundEvent::UserOffline(user) => self.on_presence(user, false),
            InboundEvent::MessagesRead(payload) => self.on_messages_read(payload),
            InboundEvent::IncomingCall(payload) => self.on_incoming_call(payload),
            InboundEvent::CallAnswered(payload) => self.on_call_answered(&payload),
            InboundEvent::CallEnded(payload) => self.on_call_closed(&payload, false),
            InboundEvent::CallRejected(payload) => self.on_call_closed(&payload, true),
        }
    }

    async fn on_new_message(&self, message: Message) {
        let (counterparty, changed, unread, from_active) = {
            let mut guard = self.state();
            let state = &mut *guard;
            let local = state.local_user().clone();
            if message.sender != local && message.recipient != local {
                warn!(sender = %message.sender.short(), "Dropping message addressed to another user");
                return;
            }
            let inbound = message.is_inbound(&local);
            let counterparty = message.counterparty(&local).clone();
            let outcome = state.messages.ingest(message.clone());

            let mut unread = None;
            if outcome.is_inserted()
                && inbound
                && state
                    .unread
                    .on_inbound_message(&message, &local, state.active_counterparty.as_ref())
            {
                unread = Some((state.unread.count(&counterparty), state.unread.total()));
            }
            let from_active = inbound && state.active_counterparty.as_ref() == Some(&counterparty);
            (counterparty, outcome.changed(), unread, from_active)
        };

        if changed {
            self.emit(CoreUpdate::MessagesChanged {
                counterparty: counterparty.clone(),
            });
        }
        if let Some((count, total)) = unread {
            self.emit(CoreUpdate::UnreadChanged {
                counterparty: counterparty.clone(),
                count,
                total,
            });
        }
        self.touch(&message).await;

        if from_active {
            // Receipt goes out in the background so the pump keeps flowing.
            let core = self.clone();
            tokio::spawn(async move { core.mark_read(&counterparty).await });
        }
    }

    fn on_typing(&self, from: UserId) {
        let window = self.inner.config.typing_window;
        {
            let mut state = self.state();
            if &from == state.local_user() {
                return;
            }
            state.typing.signal(&from);
        }
        self.emit(CoreUpdate::TypingChanged {
            counterparty: from.clone(),
        });

        // Let the render layer know once the indicator has lapsed.
        let core = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window + Duration::from_millis(10)).await;
            if !core.state().typing.is_active(&from, window) {
                core.emit(CoreUpdate::TypingChanged { counterparty: from });
            }
        });
    }

    fn on_presence(&self, user: UserId, online: bool) {
        let indexed = {
            let mut state = self.state();
            state.presence.insert(user.clone(), online);
            state.conversations.set_presence(&user, online)
        };
        trace!(user = %user.short(), online, "Presence");
        self.emit(CoreUpdate::PresenceChanged { user, online });
        if indexed {
            self.emit(CoreUpdate::ConversationsChanged);
        }
    }

    fn on_messages_read(&self, payload: ReadReceiptPayload) {
        let ids: HashSet<MessageId> = payload.message_ids.into_iter().collect();
        let marked = self.state().messages.mark_read(&ids);
        if marked > 0 {
            debug!(reader = %payload.reader.short(), marked, "Messages read by counterparty");
            self.emit(CoreUpdate::MessagesChanged {
                counterparty: payload.reader,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_new_message_forms() {
        let message = json!({
            "_id": "cccccccccccccccccccccccc",
            "sender": "bbbbbbbbbbbbbbbbbbbbbbbb",
            "recipient": "aaaaaaaaaaaaaaaaaaaaaaaa",
            "type": "text",
            "content": "hey",
            "createdAt": "2024-05-01T10:00:00Z"
        });
        let bare = InboundEvent::decode("new-message", message.clone()).unwrap();
        let wrapped = InboundEvent::decode("new-message", json!({ "message": message })).unwrap();
        match (bare, wrapped) {
            (InboundEvent::NewMessage(a), InboundEvent::NewMessage(b)) => {
                assert_eq!(a, b);
                assert_eq!(a.body.text(), Some("hey"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_presence_forms() {
        let id = "bbbbbbbbbbbbbbbbbbbbbbbb";
        assert!(matches!(
            InboundEvent::decode("user-online", json!(id)),
            Ok(InboundEvent::UserOnline(_))
        ));
        assert!(matches!(
            InboundEvent::decode("user-offline", json!({ "userId": id })),
            Ok(InboundEvent::UserOffline(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(InboundEvent::decode("typing", json!({ "from": "nope" })).is_err());
        assert!(InboundEvent::decode("incoming-call", json!(42)).is_err());
        assert!(InboundEvent::decode("not-an-event", Value::Null).is_err());
        assert!(matches!(
            InboundEvent::decode("call-ended", Value::Null),
            Ok(InboundEvent::CallEnded(_))
        ));
    }
}
