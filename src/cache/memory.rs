//! Memory Usage Module
//!
//! Samples system memory and computes the ratio of cache footprint to the
//! memory the cache may use.

use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::System;

/// Fraction of total system memory never targeted by the cache.
pub const RESERVED_HEADROOM: f64 = 0.1;

// == Memory Snapshot ==
/// System memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    /// Memory available to new allocations
    pub available: u64,
    /// Total installed memory
    pub total: u64,
}

// == Memory Probe ==
/// Source of system memory statistics.
pub trait MemoryProbe: Send + Sync {
    /// Current figures, or `None` if they cannot be read.
    fn snapshot(&self) -> Option<MemorySnapshot>;
}

// == System Memory ==
/// Reads the host's memory through `sysinfo`, refreshing on every call.
pub struct SystemMemory {
    system: Mutex<System>,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemory {
    fn snapshot(&self) -> Option<MemorySnapshot> {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        Some(MemorySnapshot {
            available: system.available_memory(),
            total,
        })
    }
}

// == Fixed Memory ==
/// A probe that always reports the same figures.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub Option<MemorySnapshot>);

impl FixedMemory {
    pub fn new(available: u64, total: u64) -> Self {
        Self(Some(MemorySnapshot { available, total }))
    }

    /// A probe whose statistics are never available.
    pub fn unavailable() -> Self {
        Self(None)
    }
}

impl MemoryProbe for FixedMemory {
    fn snapshot(&self) -> Option<MemorySnapshot> {
        self.0
    }
}

// == Usage Ratio ==
/// `footprint / (available - total * RESERVED_HEADROOM)`.
///
/// Returns `None` when statistics are missing or the headroom leaves nothing
/// to spend; callers must not evict on an unknown ratio.
pub fn usage_ratio(footprint: usize, snapshot: Option<MemorySnapshot>) -> Option<f64> {
    let snapshot = snapshot?;
    let budget = snapshot.available as f64 - snapshot.total as f64 * RESERVED_HEADROOM;
    if budget <= 0.0 {
        return None;
    }
    Some(footprint as f64 / budget)
}
