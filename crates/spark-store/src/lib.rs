//! # spark-store
//!
//! In-memory state of the chat core: message histories, the conversation
//! index, unread counters and typing signals.
//!
//! Everything here is synchronous and I/O free.  The client crate owns one
//! instance of each behind its state lock and drives them from transport
//! events and API responses.

pub mod conversations;
pub mod messages;
pub mod models;
pub mod typing;
pub mod unread;

pub use conversations::ConversationIndex;
pub use messages::MessageStore;
pub use models::*;
pub use typing::TypingTracker;
pub use unread::UnreadTracker;
