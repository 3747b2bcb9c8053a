//! Singleton call-session state machine.
//!
//! ```text
//! idle ──initiate──▶ calling ──ack / answered──▶ ongoing ──end──▶ idle
//! idle ──incoming──▶ ringing ──accept──▶ ongoing
//!                    ringing ──decline / end──▶ idle
//! any  ──remote ended / rejected──▶ idle
//! ```
//!
//! The session is pure: transitions return the [`CallSignal`] to emit and
//! the caller does the I/O.  If that I/O fails the caller resets the session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use spark_shared::protocol::{CallAnsweredPayload, IncomingCallPayload};
use spark_shared::{CallError, UserId};

use crate::signaling::CallSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Idle,
    Calling,
    Ringing,
    Ongoing,
    /// Only ever reported in the snapshot of a call that just finished;
    /// the session itself is back to `Idle` at that point.
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Calling => "calling",
            Self::Ringing => "ringing",
            Self::Ongoing => "ongoing",
            Self::Ended => "ended",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Calling | Self::Ringing | Self::Ongoing)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub status: CallStatus,
    pub call_id: Option<String>,
    pub counterparty: Option<UserId>,
    pub local_peer_id: Option<String>,
    pub remote_peer_id: Option<String>,
    /// The ringing call, for the presentation layer to accept or decline.
    pub incoming: Option<IncomingCallPayload>,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    status: CallStatus,
    call_id: Option<String>,
    counterparty: Option<UserId>,
    local_peer_id: Option<String>,
    remote_peer_id: Option<String>,
    incoming: Option<IncomingCallPayload>,
    started_at: Option<DateTime<Utc>>,
}

impl Default for CallSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CallSession {
    pub fn new() -> Self {
        Self {
            status: CallStatus::Idle,
            call_id: None,
            counterparty: None,
            local_peer_id: None,
            remote_peer_id: None,
            incoming: None,
            started_at: None,
        }
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }

    pub fn counterparty(&self) -> Option<&UserId> {
        self.counterparty.as_ref()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            status: self.status,
            call_id: self.call_id.clone(),
            counterparty: self.counterparty.clone(),
            local_peer_id: self.local_peer_id.clone(),
            remote_peer_id: self.remote_peer_id.clone(),
            incoming: self.incoming.clone(),
            started_at: self.started_at,
        }
    }

    /// `idle → calling`.
    pub fn begin_outgoing(
        &mut self,
        counterparty: UserId,
        call_id: String,
        local_peer_id: String,
    ) -> Result<CallSignal, CallError> {
        self.require(CallStatus::Idle, "initiate")?;
        debug!(to = %counterparty.short(), call_id = %call_id, "Calling");
        self.status = CallStatus::Calling;
        self.call_id = Some(call_id.clone());
        self.counterparty = Some(counterparty.clone());
        self.local_peer_id = Some(local_peer_id.clone());
        Ok(CallSignal::Invite {
            call_id,
            to: counterparty,
            peer_id: local_peer_id,
        })
    }

    /// `calling → ongoing` once signaling acknowledged the invite.
    ///
    /// The initiator does not wait for the counterparty to answer.  Ignored
    /// if the session moved on while the acknowledgement was in flight.
    pub fn outgoing_acknowledged(&mut self, call_id: &str) -> bool {
        if self.status != CallStatus::Calling || self.call_id.as_deref() != Some(call_id) {
            return false;
        }
        self.status = CallStatus::Ongoing;
        self.started_at = Some(Utc::now());
        true
    }

    /// `idle → ringing`.  Any other state rejects the call.
    pub fn receive_incoming(&mut self, payload: IncomingCallPayload) -> Result<(), CallError> {
        self.require(CallStatus::Idle, "receive a call")?;
        info!(from = %payload.from.short(), call_id = %payload.call_id, "Incoming call");
        self.status = CallStatus::Ringing;
        self.call_id = Some(payload.call_id.clone());
        self.counterparty = Some(payload.from.clone());
        self.remote_peer_id = Some(payload.peer_id.clone());
        self.incoming = Some(payload);
        Ok(())
    }

    /// `ringing → ongoing` (accept) or `ringing → idle` (decline).
    pub fn answer(&mut self, accept: bool, local_peer_id: String) -> Result<CallSignal, CallError> {
        self.require(CallStatus::Ringing, "answer")?;
        let (call_id, to) = self.current_call()?;

        if !accept {
            debug!(call_id = %call_id, "Declining call");
            self.clear();
            return Ok(CallSignal::Reject { call_id, to });
        }

        self.status = CallStatus::Ongoing;
        self.local_peer_id = Some(local_peer_id.clone());
        self.started_at = Some(Utc::now());
        Ok(CallSignal::Accept {
            call_id,
            to,
            peer_id: local_peer_id,
        })
    }

    /// The counterparty answered our call.  Valid from `calling`, and from
    /// `ongoing` while the remote peer is still unknown (the initiator went
    /// ongoing on acknowledgement).
    pub fn receive_answer(&mut self, payload: &CallAnsweredPayload) -> bool {
        if self.call_id.as_deref() != Some(payload.call_id.as_str()) {
            return false;
        }
        let accepts = match self.status {
            CallStatus::Calling => true,
            CallStatus::Ongoing => self.remote_peer_id.is_none(),
            _ => false,
        };
        if !accepts {
            return false;
        }
        self.remote_peer_id = Some(payload.peer_id.clone());
        if self.status == CallStatus::Calling {
            self.started_at = Some(Utc::now());
        }
        self.status = CallStatus::Ongoing;
        true
    }

    /// Hang up.  Returns the signal for the counterparty, or `None` when
    /// there was no call (a no-op).
    pub fn end(&mut self) -> Option<CallSignal> {
        if !self.status.is_live() {
            return None;
        }
        let signal = self
            .current_call()
            .ok()
            .map(|(call_id, to)| CallSignal::End { call_id, to });
        self.clear();
        signal
    }

    /// Forced return to `idle`, used when the remote side ended or rejected
    /// the call, or when signaling failed.  Returns the finished call with
    /// status `Ended`, if there was one.
    pub fn reset(&mut self) -> Option<CallSnapshot> {
        if self.status == CallStatus::Idle {
            return None;
        }
        let mut finished = self.snapshot();
        finished.status = CallStatus::Ended;
        self.clear();
        Some(finished)
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    fn require(&self, expected: CallStatus, action: &'static str) -> Result<(), CallError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(CallError::InvalidState {
                action,
                status: self.status.as_str(),
            })
        }
    }

    fn current_call(&self) -> Result<(String, UserId), CallError> {
        match (&self.call_id, &self.counterparty) {
            (Some(call_id), Some(to)) => Ok((call_id.clone(), to.clone())),
            _ => Err(CallError::InvalidState {
                action: "signal",
                status: self.status.as_str(),
            }),
        }
    }
}
