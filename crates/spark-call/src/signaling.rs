use serde::Serialize;
use serde_json::Value;

use spark_shared::protocol::{EMIT_ANSWER_CALL, EMIT_CALL_USER, EMIT_END_CALL, EMIT_REJECT_CALL};
use spark_shared::UserId;

/// Outbound call signaling produced by [`CallSession`](crate::CallSession)
/// transitions.  The controller emits it over the push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallSignal {
    /// Ring the counterparty.
    Invite {
        call_id: String,
        to: UserId,
        peer_id: String,
    },
    /// Accept an incoming call.
    Accept {
        call_id: String,
        to: UserId,
        peer_id: String,
    },
    /// Decline an incoming call.
    Reject { call_id: String, to: UserId },
    /// Hang up.
    End { call_id: String, to: UserId },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignalPayload<'a> {
    call_id: &'a str,
    to: &'a UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_id: Option<&'a str>,
}

impl CallSignal {
    pub fn event(&self) -> &'static str {
        match self {
            Self::Invite { .. } => EMIT_CALL_USER,
            Self::Accept { .. } => EMIT_ANSWER_CALL,
            Self::Reject { .. } => EMIT_REJECT_CALL,
            Self::End { .. } => EMIT_END_CALL,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::Invite { call_id, .. }
            | Self::Accept { call_id, .. }
            | Self::Reject { call_id, .. }
            | Self::End { call_id, .. } => call_id,
        }
    }

    pub fn recipient(&self) -> &UserId {
        match self {
            Self::Invite { to, .. }
            | Self::Accept { to, .. }
            | Self::Reject { to, .. }
            | Self::End { to, .. } => to,
        }
    }

    pub fn payload(&self) -> Value {
        let peer_id = match self {
            Self::Invite { peer_id, .. } | Self::Accept { peer_id, .. } => Some(peer_id.as_str()),
            Self::Reject { .. } | Self::End { .. } => None,
        };
        serde_json::to_value(SignalPayload {
            call_id: self.call_id(),
            to: self.recipient(),
            peer_id,
        })
        .unwrap_or(Value::Null)
    }
}
