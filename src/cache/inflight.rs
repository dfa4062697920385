//! Per-cache-key in-flight tracking
//!
//! Two concurrent retrievals for the same key must not both miss the cache
//! and race the resolver toward the same output path. Each key maps to a
//! shared async lock; holding it makes retrieval at-most-once per key, and
//! whoever loses the race re-checks the cache under the lock and hits.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct InflightGuard {
    keys: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InflightGuard {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for one cache key, waiting out any fetch already in
    /// flight. Idle entries (no holder, no waiters) are pruned on the way in.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut keys = self.keys.lock().await;
            keys.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(keys.entry(key.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.keys.lock().await.len()
    }
}

impl Default for InflightGuard {
    fn default() -> Self {
        Self::new()
    }
}
