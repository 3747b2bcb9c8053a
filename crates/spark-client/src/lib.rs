//! # spark-client
//!
//! Conversation and call session core of the Spark chat client.
//!
//! The core keeps the in-memory message histories, conversation list,
//! unread counters, typing indicators and the call session consistent while
//! messages arrive over the push transport, the REST API or both.  The
//! embedding app builds a [`ChatCore`] from its [`Collaborators`], attaches a
//! [`TransportEventRouter`] and renders from [`CoreUpdate`]s.

pub mod calls;
pub mod chat;
pub mod config;
pub mod conversations;
pub mod delivery;
pub mod events;
pub mod inflight;
pub mod router;
pub mod state;

pub use crate::config::CoreConfig;
pub use crate::chat::{ChatCore, Collaborators};
pub use crate::events::CoreUpdate;
pub use crate::inflight::InflightRegistry;
pub use crate::router::{InboundEvent, TransportEventRouter};
pub use crate::state::CoreSnapshot;

pub use spark_call::{CallSnapshot, CallStatus};
pub use spark_shared::{
    ApiError, CallError, ChatError, Message, MessageBody, MessageKind, OutgoingFile, SendError,
    UploadError, UserId, UserProfile,
};

/// Default log filter when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str =
    "spark_client=debug,spark_net=debug,spark_store=info,spark_call=info,warn";

/// Install the `tracing` subscriber.  Honours `RUST_LOG`; safe to call more
/// than once.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
