//! Per-key async locks for collapsing identical in-flight requests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (String, String);

/// Map of `(doc id, question)` to the lock serializing its cache misses
///
/// Entries live only while someone holds or waits on them.
#[derive(Default)]
pub struct InFlight {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

/// Held while computing the answer for one key
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: Key,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task is working on this key
    pub async fn acquire(&self, doc_id: &str, question: &str) -> InFlightGuard<'_> {
        let key = (doc_id.to_string(), question.to_string());
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;

        InFlightGuard {
            owner: self,
            key,
            lock,
            guard: Some(guard),
        }
    }

    /// Number of keys currently locked or awaited
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map plus ours means nobody else is waiting
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}
