// Collaborator seams of the chat core and their concrete adapters.

pub mod api;
pub mod channel;
pub mod http;
pub mod transport;

pub use api::{ChatApi, ProgressFn, UploadClient, UserLookup};
pub use channel::{ChannelTransport, OutboundFrame};
pub use http::HttpApi;
pub use transport::{EventHandler, PushTransport, SubscriptionId};
