//! Updates pushed to the render layer.
//!
//! The core never calls into the presentation layer.  It broadcasts a
//! [`CoreUpdate`] whenever visible state changes; subscribers re-read what
//! they need through the query methods or [`ChatCore::snapshot`](crate::ChatCore::snapshot).

use serde::Serialize;
use tokio::sync::broadcast;

use spark_call::CallSnapshot;
use spark_shared::UserId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CoreUpdate {
    MessagesChanged {
        counterparty: UserId,
    },
    ConversationsChanged,
    UnreadChanged {
        counterparty: UserId,
        count: u32,
        total: u32,
    },
    TypingChanged {
        counterparty: UserId,
    },
    PresenceChanged {
        user: UserId,
        online: bool,
    },
    CallChanged(CallSnapshot),
}

pub(crate) fn emit_update(tx: &broadcast::Sender<CoreUpdate>, update: CoreUpdate) {
    if let Err(e) = tx.send(update) {
        tracing::trace!(update = ?e.0, "No update subscribers");
    }
}
