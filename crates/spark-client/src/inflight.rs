//! Deduplication of concurrent operations.
//!
//! The first caller for a key starts the operation; anyone asking for the
//! same key while it is pending awaits the same shared future instead of
//! issuing a second request.  The entry is dropped once the result is in.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

pub struct InflightRegistry<K, V> {
    pending: Mutex<HashMap<K, Shared<BoxFuture<'static, V>>>>,
}

impl<K, V> Default for InflightRegistry<K, V> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> InflightRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `start()` under `key`, or join the run already pending for it.
    /// `start` is only called when no run is pending.
    pub async fn run<F, Fut>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let shared = {
            let mut pending = self.lock();
            match pending.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let fut = start().boxed().shared();
                    pending.insert(key.clone(), fut.clone());
                    fut
                }
            }
        };

        let value = shared.clone().await;

        // A later run may already occupy the slot; only remove our own.
        let mut pending = self.lock();
        if pending.get(&key).is_some_and(|current| current.ptr_eq(&shared)) {
            pending.remove(&key);
        }
        value
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Shared<BoxFuture<'static, V>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
