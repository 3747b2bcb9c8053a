//! Channel-backed push transport.
//!
//! The socket itself runs in a separate driver task owned by the embedding
//! application.  The driver and the core talk through typed channels:
//!
//! - outbound: [`OutboundFrame`]s are pushed into a tokio mpsc channel; the
//!   driver writes them to the socket and answers each through its oneshot
//!   `ack` sender;
//! - inbound: the driver calls [`ChannelTransport::deliver`] for every event
//!   it reads, which fans out to the registered handlers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use spark_shared::TransportError;

use crate::transport::{EventHandler, PushTransport, SubscriptionId};

/// An event waiting to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    pub event: String,
    pub payload: Value,
    /// Server acknowledgement, or a rejection reason.
    pub ack: oneshot::Sender<Result<Value, String>>,
}

pub struct ChannelTransport {
    outbound: mpsc::Sender<OutboundFrame>,
    handlers: Mutex<HashMap<SubscriptionId, (String, EventHandler)>>,
    next_id: AtomicU64,
    connected: AtomicBool,
}

impl ChannelTransport {
    /// Create a transport and the receiving half the socket driver reads
    /// outbound frames from.  Starts out connected.
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(buffer);
        let transport = Arc::new(Self {
            outbound: tx,
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
        });
        (transport, rx)
    }

    /// Reflect the socket state, as reported by the driver.
    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::SeqCst);
        if was != connected {
            debug!(connected, "Push transport connectivity changed");
        }
    }

    /// Dispatch an inbound event to every handler subscribed to it.
    /// Returns the number of handlers invoked.
    pub fn deliver(&self, event: &str, payload: Value) -> usize {
        // Handlers run outside the lock so they may (un)subscribe.
        let targets: Vec<EventHandler> = self
            .lock_handlers()
            .values()
            .filter(|(name, _)| name == event)
            .map(|(_, handler)| handler.clone())
            .collect();

        if targets.is_empty() {
            trace!(event, "No handler for inbound event");
        }
        for handler in &targets {
            handler(payload.clone());
        }
        targets.len()
    }

    /// Number of live registrations, across all event names.
    pub fn subscription_count(&self) -> usize {
        self.lock_handlers().len()
    }

    /// Number of live registrations for `event`.
    pub fn subscriptions_for(&self, event: &str) -> usize {
        self.lock_handlers()
            .values()
            .filter(|(name, _)| name == event)
            .count()
    }

    fn lock_handlers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, (String, EventHandler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PushTransport for ChannelTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<Value, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.outbound
            .send(OutboundFrame {
                event: event.to_string(),
                payload,
                ack: ack_tx,
            })
            .await
            .map_err(|_| TransportError::Closed)?;

        match ack_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(reason)) => {
                warn!(event, reason = %reason, "Push event rejected");
                Err(TransportError::Rejected(reason))
            }
            Err(_) => Err(TransportError::Closed),
        }
    }

    fn on(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock_handlers()
            .insert(id, (event.to_string(), handler));
        trace!(event, id = id.0, "Subscribed");
        id
    }

    fn off(&self, id: SubscriptionId) {
        if let Some((event, _)) = self.lock_handlers().remove(&id) {
            trace!(event = %event, id = id.0, "Unsubscribed");
        }
    }
}
