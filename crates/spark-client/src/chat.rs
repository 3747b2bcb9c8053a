//! The chat core handle.
//!
//! [`ChatCore`] is a cheap `Clone` over shared state.  Operations live in
//! sibling modules as further `impl ChatCore` blocks:
//!
//! - [`delivery`](crate::delivery): send, send_file, typing and read receipts
//! - [`conversations`](crate::conversations): touch, history and list loads
//! - [`calls`](crate::calls): the call controller
//! - [`router`](crate::router): inbound push events

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use spark_call::CallSnapshot;
use spark_net::{ChatApi, HttpApi, PushTransport, UploadClient, UserLookup};
use spark_shared::{ApiError, Message, TransportError, UserId, UserProfile, ValidationError};
use spark_store::ConversationSummary;

use crate::config::CoreConfig;
use crate::events::{emit_update, CoreUpdate};
use crate::inflight::InflightRegistry;
use crate::state::{CoreSnapshot, CoreState};

/// External services the core talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn PushTransport>,
    pub api: Arc<dyn ChatApi>,
    pub uploads: Arc<dyn UploadClient>,
    pub lookup: Arc<dyn UserLookup>,
}

impl Collaborators {
    /// Serve the three REST seams from one [`HttpApi`] built from `config`.
    pub fn http(transport: Arc<dyn PushTransport>, config: &CoreConfig) -> Result<Self, ApiError> {
        let mut api = HttpApi::new(config.api_url.clone(), config.request_timeout)?;
        if let Some(token) = &config.api_token {
            api = api.with_token(token.clone());
        }
        let api = Arc::new(api);
        Ok(Self {
            transport,
            api: api.clone(),
            uploads: api.clone(),
            lookup: api,
        })
    }
}

pub(crate) struct CoreInner {
    pub(crate) config: CoreConfig,
    pub(crate) state: Mutex<CoreState>,
    pub(crate) services: Collaborators,
    pub(crate) updates: broadcast::Sender<CoreUpdate>,
    pub(crate) profiles: InflightRegistry<UserId, Result<UserProfile, ApiError>>,
    pub(crate) receipts: InflightRegistry<UserId, Result<(), ApiError>>,
    pub(crate) histories: InflightRegistry<UserId, Result<Vec<Message>, ApiError>>,
}

#[derive(Clone)]
pub struct ChatCore {
    pub(crate) inner: Arc<CoreInner>,
}

impl ChatCore {
    pub fn new(local_user: UserId, config: CoreConfig, services: Collaborators) -> Self {
        info!(user = %local_user.short(), "Starting chat core");
        let (updates, _) = broadcast::channel(config.update_buffer.max(1));
        Self {
            inner: Arc::new(CoreInner {
                state: Mutex::new(CoreState::new(local_user)),
                config,
                services,
                updates,
                profiles: InflightRegistry::new(),
                receipts: InflightRegistry::new(),
                histories: InflightRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn local_user(&self) -> UserId {
        self.state().local_user().clone()
    }

    /// Stream of state changes for the render layer.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn snapshot(&self) -> CoreSnapshot {
        self.state().snapshot()
    }

    /// Ordered history with `counterparty`.  `None` for an invalid id.
    pub fn messages(&self, counterparty: &str) -> Option<Vec<Message>> {
        let id = parse_user(counterparty, "messages").ok()?;
        Some(self.state().messages.list_for(&id).to_vec())
    }

    /// Conversation summaries, most recent first.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.state().conversations.list().to_vec()
    }

    pub fn unread_count(&self, counterparty: &str) -> Option<u32> {
        let id = parse_user(counterparty, "unread_count").ok()?;
        Some(self.state().unread.count(&id))
    }

    pub fn unread_total(&self) -> u32 {
        self.state().unread.total()
    }

    /// Whether `counterparty` signaled typing within the typing window.
    pub fn is_typing(&self, counterparty: &str) -> bool {
        let Ok(id) = parse_user(counterparty, "is_typing") else {
            return false;
        };
        self.state()
            .typing
            .is_active(&id, self.inner.config.typing_window)
    }

    /// Last reported presence; `None` when unknown or the id is invalid.
    pub fn presence(&self, user: &str) -> Option<bool> {
        let id = parse_user(user, "presence").ok()?;
        self.state().presence_of(&id)
    }

    pub fn active_conversation(&self) -> Option<UserId> {
        self.state().active_counterparty.clone()
    }

    pub fn call(&self) -> CallSnapshot {
        self.state().call.snapshot()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, CoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, update: CoreUpdate) {
        emit_update(&self.inner.updates, update);
    }

    /// Emit on the push transport, bounded by the configured push timeout.
    /// Expiry is reported as [`TransportError::Timeout`].
    pub(crate) async fn emit_bounded(&self, event: &str, payload: Value) -> Result<Value, TransportError> {
        let transport = &self.inner.services.transport;
        if !transport.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let limit = self.inner.config.push_timeout;
        match tokio::time::timeout(limit, transport.emit(event, payload)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(limit.as_millis() as u64)),
        }
    }
}

/// Validate a textual user id at the core boundary.  Failures are logged.
pub(crate) fn parse_user(value: &str, operation: &'static str) -> Result<UserId, ValidationError> {
    UserId::parse(value).map_err(|e| {
        warn!(operation, error = %e, "Rejected invalid id");
        e
    })
}
