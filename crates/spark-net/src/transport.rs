//! Push transport seam.
//!
//! A bidirectional, named-event channel to the realtime service.  Outbound
//! events are acknowledged (or not) by the server; inbound events are fanned
//! out to handlers registered with [`PushTransport::on`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use spark_shared::TransportError;

/// Callback invoked for every inbound event of the subscribed name.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Handle returned by [`PushTransport::on`], consumed by [`PushTransport::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Whether the underlying socket is currently up.
    fn is_connected(&self) -> bool;

    /// Send `event` and wait for the server acknowledgement.  Callers bound
    /// the wait themselves.
    async fn emit(&self, event: &str, payload: Value) -> Result<Value, TransportError>;

    /// Register `handler` for inbound `event`.
    fn on(&self, event: &str, handler: EventHandler) -> SubscriptionId;

    /// Remove a registration.  Unknown handles are ignored.
    fn off(&self, id: SubscriptionId);
}
