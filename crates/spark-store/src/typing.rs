use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use spark_shared::UserId;

/// Last typing signal per counterparty.  Nothing is ever cleared; a signal
/// simply stops counting once it is older than the window.
#[derive(Debug, Clone, Default)]
pub struct TypingTracker {
    last_signal: HashMap<UserId, DateTime<Utc>>,
}

impl TypingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&mut self, counterparty: &UserId) {
        self.signal_at(counterparty, Utc::now());
    }

    pub fn signal_at(&mut self, counterparty: &UserId, at: DateTime<Utc>) {
        self.last_signal.insert(counterparty.clone(), at);
    }

    pub fn is_active(&self, counterparty: &UserId, window: Duration) -> bool {
        self.is_active_at(counterparty, Utc::now(), window)
    }

    /// `now - last < window`; false if never signaled.
    pub fn is_active_at(&self, counterparty: &UserId, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(last) = self.last_signal.get(counterparty) else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(window) else {
            return true;
        };
        now.signed_duration_since(*last) < window
    }
}
