//! # spark-call
//!
//! One-to-one call coordination: the session state machine and the
//! signaling messages it produces.  Media negotiation happens elsewhere;
//! this crate only tracks status and the exchanged peer identifiers.

pub mod session;
pub mod signaling;

pub use session::{CallSession, CallSnapshot, CallStatus};
pub use signaling::CallSignal;
