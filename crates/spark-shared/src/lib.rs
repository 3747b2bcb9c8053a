//! Types shared by every Spark crate: identifiers, messages, wire payloads
//! and the error taxonomy.

pub mod constants;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod types;

pub use error::{ApiError, CallError, ChatError, SendError, TransportError, UploadError, ValidationError};
pub use identity::{is_valid_id, ClientToken, MessageId, UserId};
pub use types::{FileAttachment, Message, MessageBody, MessageKind, OutgoingFile, UploadProgress, UserProfile};
