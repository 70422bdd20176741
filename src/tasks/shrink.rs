//! Periodic Shrink Task
//!
//! Background task that keeps a store near its target usage even when no
//! memoized calls arrive to trigger a pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Store;

/// Spawns a background task that periodically runs an eviction pass.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between passes. Each pass is bounded by the store's shrink budget, so
/// it never holds the store lock for long.
///
/// # Arguments
/// * `store` - Shared store to shrink
/// * `interval_secs` - Interval in seconds between passes
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort it during
/// shutdown.
///
/// # Example
/// ```ignore
/// let store = reckon::create_store(Some(0.5), None);
/// let handle = spawn_shrink_task(store.clone(), 1);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_shrink_task(store: Arc<Store>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting shrink task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let evicted = store.shrink();
            if evicted > 0 {
                info!(
                    "Periodic shrink: evicted {} entries, {} remaining",
                    evicted,
                    store.len()
                );
            } else {
                debug!("Periodic shrink: nothing to evict");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FixedMemory, Strategy};
    use crate::config::Config;

    fn ttl_store() -> Arc<Store> {
        let config = Config {
            strategy: Strategy::Ttl,
            ..Config::default()
        };
        Arc::new(Store::with_probe(
            &config,
            Arc::new(FixedMemory::new(1 << 30, 1 << 30)),
        ))
    }

    #[tokio::test]
    async fn test_shrink_task_removes_expired_entries() {
        let store = ttl_store();
        let stamp = store
            .memoize(|n: &u32| n + 1)
            .with_expiration(Duration::from_millis(200));
        stamp.call(1);
        assert_eq!(store.len(), 1);

        let handle = spawn_shrink_task(store.clone(), 1);

        // Wait for the entry to expire and a pass to run
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(store.is_empty(), "Expired entry should have been evicted");
        assert_eq!(store.stats().evictions, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_shrink_task_preserves_valid_entries() {
        let store = ttl_store();
        let stamp = store
            .memoize(|n: &u32| n + 1)
            .with_expiration(Duration::from_secs(3600));
        stamp.call(1);

        let handle = spawn_shrink_task(store.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.len(), 1, "Valid entry should not be removed");

        handle.abort();
    }

    #[tokio::test]
    async fn test_shrink_task_can_be_aborted() {
        let handle = spawn_shrink_task(ttl_store(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
