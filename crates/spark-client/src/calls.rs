//! Call controller: drives [`CallSession`](spark_call::CallSession) and
//! carries its signaling over the push transport.
//!
//! Peer ids are fresh UUIDs per call.  Any signaling failure puts the
//! session back to idle so a stuck `calling` state cannot outlive its call.

use tracing::{debug, info, warn};
use uuid::Uuid;

use spark_call::{CallSignal, CallSnapshot, CallStatus};
use spark_shared::protocol::{CallAnsweredPayload, CallClosedPayload, IncomingCallPayload};
use spark_shared::CallError;

use crate::chat::{parse_user, ChatCore};
use crate::events::CoreUpdate;

impl ChatCore {
    /// Ring `counterparty`.
    ///
    /// Refused when the counterparty is known to be offline; unknown
    /// presence is allowed through.  Once the signaling layer acknowledges
    /// the invite the call is `ongoing`.
    pub async fn initiate_call(&self, counterparty: &str) -> Result<CallSnapshot, CallError> {
        let counterparty = parse_user(counterparty, "initiate_call")?;

        let (signal, snapshot) = {
            let mut state = self.state();
            if state.presence_of(&counterparty) == Some(false) {
                warn!(to = %counterparty.short(), "Not calling offline user");
                return Err(CallError::CounterpartyOffline(counterparty));
            }
            let signal = state.call.begin_outgoing(
                counterparty,
                Uuid::new_v4().to_string(),
                Uuid::new_v4().to_string(),
            )?;
            (signal, state.call.snapshot())
        };
        self.emit(CoreUpdate::CallChanged(snapshot));

        self.signal(&signal).await?;

        let snapshot = {
            let mut state = self.state();
            state.call.outgoing_acknowledged(signal.call_id());
            state.call.snapshot()
        };
        info!(call_id = %signal.call_id(), status = %snapshot.status, "Call started");
        self.emit(CoreUpdate::CallChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Accept or decline the ringing call.
    pub async fn answer_call(&self, accept: bool) -> Result<CallSnapshot, CallError> {
        let (signal, snapshot) = {
            let mut state = self.state();
            let signal = state.call.answer(accept, Uuid::new_v4().to_string())?;
            (signal, state.call.snapshot())
        };
        debug!(call_id = %signal.call_id(), accept, "Answering call");
        self.emit(CoreUpdate::CallChanged(snapshot.clone()));

        self.signal(&signal).await?;
        Ok(snapshot)
    }

    /// Hang up.  A no-op returning `Ok(None)` when there is no call.
    pub async fn end_call(&self) -> Result<Option<CallSnapshot>, CallError> {
        let (signal, finished) = {
            let mut state = self.state();
            let mut finished = state.call.snapshot();
            let Some(signal) = state.call.end() else {
                return Ok(None);
            };
            finished.status = CallStatus::Ended;
            (signal, finished)
        };
        info!(call_id = %signal.call_id(), "Call ended locally");
        self.emit(CoreUpdate::CallChanged(finished.clone()));

        self.signal(&signal).await?;
        Ok(Some(finished))
    }

    pub(crate) fn on_incoming_call(&self, payload: IncomingCallPayload) {
        let call_id = payload.call_id.clone();
        let snapshot = {
            let mut state = self.state();
            if let Err(e) = state.call.receive_incoming(payload) {
                warn!(call_id = %call_id, error = %e, "Ignoring incoming call");
                return;
            }
            state.call.snapshot()
        };
        self.emit(CoreUpdate::CallChanged(snapshot));
    }

    pub(crate) fn on_call_answered(&self, payload: &CallAnsweredPayload) {
        let snapshot = {
            let mut state = self.state();
            if !state.call.receive_answer(payload) {
                debug!(call_id = %payload.call_id, "Stale call answer");
                return;
            }
            state.call.snapshot()
        };
        self.emit(CoreUpdate::CallChanged(snapshot));
    }

    /// The counterparty hung up or declined.  Always lands in idle.
    pub(crate) fn on_call_closed(&self, payload: &CallClosedPayload, rejected: bool) {
        let finished = {
            let mut state = self.state();
            if let (Some(theirs), Some(ours)) = (payload.call_id.as_deref(), state.call.call_id()) {
                if theirs != ours {
                    debug!(theirs, ours, "Call close for another call id");
                }
            }
            state.call.reset()
        };
        if let Some(finished) = finished {
            info!(
                rejected,
                reason = payload.reason.as_deref().unwrap_or(""),
                "Call closed by counterparty"
            );
            self.emit(CoreUpdate::CallChanged(finished));
        }
    }

    /// Emit a call signal.  On failure the call it belongs to is dropped.
    async fn signal(&self, signal: &CallSignal) -> Result<(), CallError> {
        match self.emit_bounded(signal.event(), signal.payload()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(event = signal.event(), call_id = %signal.call_id(), error = %e, "Call signaling failed");
                self.abort_call(signal.call_id());
                Err(CallError::Signaling(e.to_string()))
            }
        }
    }

    fn abort_call(&self, call_id: &str) {
        let finished = {
            let mut state = self.state();
            if state.call.call_id() != Some(call_id) {
                return;
            }
            state.call.reset()
        };
        if let Some(finished) = finished {
            self.emit(CoreUpdate::CallChanged(finished));
        }
    }
}
