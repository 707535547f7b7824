//! Per-key async serialization.
//!
//! Sync runs for the same login and trending updates for the same language
//! must not interleave; distinct keys proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Registry of per-key mutexes. Guards are held across a whole operation.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyedLocks {
    inner: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub(crate) async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let existing = {
            let read = self.inner.read().await;
            read.get(key).cloned()
        };

        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut write = self.inner.write().await;
                // Evict entries nobody holds anymore before growing the map.
                write.retain(|_, lock| Arc::strong_count(lock) > 1);
                write
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn same_key_serializes() {
        let locks = KeyedLocks::default();
        let guard = locks.acquire("octo/repo").await;

        let contended = timeout(Duration::from_millis(10), locks.acquire("octo/repo")).await;
        assert!(contended.is_err(), "second acquire should block");

        drop(guard);
        let reacquired = timeout(Duration::from_millis(10), locks.acquire("octo/repo")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_evicted() {
        let locks = KeyedLocks::default();
        for i in 0..10 {
            drop(locks.acquire(&format!("repo-{i}")).await);
        }

        let held = locks.acquire("held/repo").await;
        let _fresh = locks.acquire("fresh/repo").await;

        let map = locks.inner.read().await;
        assert!(map.contains_key("held/repo"));
        assert!(map.contains_key("fresh/repo"));
        assert_eq!(map.len(), 2, "idle entries should have been evicted");
        drop(held);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_are_independent() {
        let locks = KeyedLocks::default();
        let _guard = locks.acquire("octo/repo").await;

        let other = timeout(Duration::from_millis(10), locks.acquire("hexo/site")).await;
        assert!(other.is_ok());
    }
}
