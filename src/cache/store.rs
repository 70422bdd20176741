//! Cache Store Module
//!
//! Owning container of memoized entries, keyed by call signature, with
//! hit/miss counters and memory-pressure-aware shrinking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::entry::{EntryInfo, Slot};
use crate::cache::key::CallKey;
use crate::cache::memory::{usage_ratio, MemoryProbe, SystemMemory};
use crate::cache::shrink;
use crate::cache::stats::{CacheInfo, CacheStats};
use crate::cache::strategy::Strategy;
use crate::config::Config;
use crate::error::{CacheError, Result};

/// State guarded by the store lock.
pub(crate) struct StoreInner {
    pub(crate) entries: HashMap<CallKey, Arc<dyn Slot>>,
    pub(crate) stats: CacheStats,
    pub(crate) strategy: Strategy,
    pub(crate) target_usage: f64,
    next_seq: u64,
}

impl StoreInner {
    /// Estimated bytes held by all entries.
    pub(crate) fn footprint(&self) -> usize {
        self.entries.values().map(|slot| slot.footprint()).sum()
    }
}

// == Cache Store ==
/// A thread-safe memoization cache.
///
/// The strategy is fixed at construction; the target usage can be changed at
/// any time.
pub struct Store {
    inner: Mutex<StoreInner>,
    probe: Arc<dyn MemoryProbe>,
    default_expiration: Duration,
    shrink_budget: Duration,
}

impl Store {
    // == Constructor ==
    /// Creates a store that samples the host's memory.
    pub fn new(config: &Config) -> Self {
        Self::with_probe(config, Arc::new(SystemMemory::new()))
    }

    /// Creates a store that reads memory statistics from `probe`.
    pub fn with_probe(config: &Config, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                stats: CacheStats::new(),
                strategy: config.strategy,
                target_usage: config.target_usage,
                next_seq: 0,
            }),
            probe,
            default_expiration: config.default_expiration(),
            shrink_budget: config.shrink_budget(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.inner.lock().strategy
    }

    pub fn target_usage(&self) -> f64 {
        self.inner.lock().target_usage
    }

    pub fn default_expiration(&self) -> Duration {
        self.default_expiration
    }

    // == Set Target Usage ==
    /// Sets the usage ratio the store shrinks toward.
    ///
    /// A very low ratio effectively disables caching. Ratios above 1.0 are
    /// accepted; the reserved headroom still keeps a tenth of system memory
    /// out of reach.
    pub fn set_target_usage(&self, ratio: f64) -> Result<()> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(CacheError::InvalidTargetUsage(ratio));
        }
        self.inner.lock().target_usage = ratio;
        info!("Target usage set to {}", ratio);
        Ok(())
    }

    // == Lookup ==
    /// Looks up `key`, counting a hit if present and a miss otherwise.
    pub(crate) fn lookup(&self, key: &CallKey) -> Option<Arc<dyn Slot>> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key).cloned() {
            Some(slot) => {
                inner.stats.record_hit();
                Some(slot)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    /// Counts a call that could not be cached.
    pub(crate) fn record_bypass(&self) {
        self.inner.lock().stats.record_miss();
    }

    /// Allocates the next insertion sequence number.
    pub(crate) fn next_seq(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_seq += 1;
        inner.next_seq
    }

    // == Insert ==
    /// Stores `slot` under `key`. The last insert for a key wins.
    pub(crate) fn insert(&self, key: CallKey, slot: Arc<dyn Slot>) {
        let replaced = self.inner.lock().entries.insert(key, slot);
        if replaced.is_some() {
            debug!("Concurrent miss replaced an existing entry");
        }
    }

    /// Whether an entry exists for `key`, without touching the counters.
    pub fn contains_key(&self, key: &CallKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    // == Size ==
    /// Estimated footprint of all cached entries in bytes.
    pub fn size(&self) -> usize {
        self.inner.lock().footprint()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    // == Usage ==
    /// Footprint over usable system memory, `None` when it cannot be determined.
    pub fn usage(&self) -> Option<f64> {
        let footprint = self.size();
        usage_ratio(footprint, self.probe.snapshot())
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    // == Info ==
    /// Consistent snapshot of the store.
    pub fn info(&self) -> CacheInfo {
        let inner = self.inner.lock();
        let size = inner.footprint();
        CacheInfo {
            strategy: inner.strategy,
            entries: inner.entries.len(),
            size,
            usage: usage_ratio(size, self.probe.snapshot()),
            target: inner.target_usage,
            hits: inner.stats.hits,
            misses: inner.stats.misses,
        }
    }

    /// Keys of all cached entries, in no particular order.
    pub fn keys(&self) -> Vec<CallKey> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Snapshots of all cached entries, next to be evicted first.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let (strategy, slots) = {
            let inner = self.inner.lock();
            let slots: Vec<Arc<dyn Slot>> = inner.entries.values().cloned().collect();
            (inner.strategy, slots)
        };
        let now = Instant::now();
        shrink::rank(slots.iter(), strategy, now)
            .into_iter()
            .map(|(_, slot)| slot.info(now))
            .collect()
    }

    // == Shrink ==
    /// Runs one eviction pass. Returns the number of entries evicted.
    pub fn shrink(&self) -> usize {
        let evicted = {
            let mut inner = self.inner.lock();
            shrink::shrink(&mut inner, self.probe.as_ref(), self.shrink_budget)
        };
        // Evicted values are dropped outside the lock
        evicted.len()
    }

    // == Clear ==
    /// Removes every entry and resets the counters.
    ///
    /// Reads already in flight keep their own handle on the entry they are
    /// reading and complete normally.
    pub fn clear(&self) {
        let removed = {
            let mut inner = self.inner.lock();
            inner.stats.reset();
            let removed = std::mem::take(&mut inner.entries);
            shrink::reclaim(&mut inner);
            removed
        };
        info!("Cache cleared: {} entries removed", removed.len());
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

// == Create Store ==
/// Creates a shareable store, falling back to defaults for omitted knobs.
///
/// An invalid `target_usage` is ignored with a warning.
pub fn create_store(target_usage: Option<f64>, strategy: Option<Strategy>) -> Arc<Store> {
    let mut config = Config::default();
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    match target_usage {
        Some(ratio) if ratio.is_finite() && ratio >= 0.0 => config.target_usage = ratio,
        Some(ratio) => warn!(
            "Ignoring invalid target usage {}, using {}",
            ratio, config.target_usage
        ),
        None => {}
    }
    Arc::new(Store::new(&config))
}
