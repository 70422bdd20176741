//! Cache Statistics Module
//!
//! Tracks hit, miss and eviction counters and the info snapshot built from
//! them.

use serde::Serialize;

use crate::cache::strategy::Strategy;

// == Cache Stats ==
/// Counters of one store, reset by `clear`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the cache
    pub hits: u64,
    /// Calls that computed, including uncacheable ones
    pub misses: u64,
    /// Entries removed by shrink passes
    pub evictions: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was called yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// == Cache Info ==
/// Snapshot of a store, taken under a single lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub strategy: Strategy,
    /// Number of cached entries
    pub entries: usize,
    /// Estimated footprint in bytes
    pub size: usize,
    /// Footprint over usable system memory, `None` when unknown
    pub usage: Option<f64>,
    /// Usage ratio the store shrinks toward
    pub target: f64,
    pub hits: u64,
    pub misses: u64,
}
