//! Eviction Module
//!
//! Best-effort, time-bounded shrinking of a store toward its target usage.
//!
//! A pass ranks a snapshot of the entries in eviction order and evicts
//! from the front. Ratio-driven strategies stop once usage is at or under the
//! target; the TTL strategy stops at the first entry that has not expired.
//! Either way the pass gives up once its time budget is spent, and later
//! passes pick up where it left off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::entry::Slot;
use crate::cache::memory::{usage_ratio, MemoryProbe};
use crate::cache::store::StoreInner;
use crate::cache::strategy::Strategy;

/// Default wall-clock budget of a single pass.
pub const MAX_SHRINK_TIME: Duration = Duration::from_millis(1);

// == Rank ==
/// Orders entries for eviction under `strategy`, ties by insertion order.
pub(crate) fn rank<'a>(
    slots: impl Iterator<Item = &'a Arc<dyn Slot>>,
    strategy: Strategy,
    now: Instant,
) -> Vec<(f64, Arc<dyn Slot>)> {
    let mut ranked: Vec<(f64, Arc<dyn Slot>)> = slots
        .map(|slot| (slot.score(now), Arc::clone(slot)))
        .collect();
    ranked.sort_by(|(a_score, a), (b_score, b)| {
        strategy
            .eviction_cmp(*a_score, *b_score)
            .then_with(|| a.seq().cmp(&b.seq()))
    });
    ranked
}

// == Shrink ==
/// Runs one pass over `inner`.
///
/// Returns the evicted entries so the caller can drop them after releasing
/// the store lock.
pub(crate) fn shrink(
    inner: &mut StoreInner,
    probe: &dyn MemoryProbe,
    budget: Duration,
) -> Vec<Arc<dyn Slot>> {
    if inner.entries.is_empty() {
        return Vec::new();
    }

    let start = Instant::now();
    let evicted = if inner.strategy.is_ratio_driven() {
        shrink_to_target(inner, probe, start, budget)
    } else {
        shrink_expired(inner, start, budget)
    };

    if !evicted.is_empty() {
        inner.stats.record_evictions(evicted.len());
        reclaim(inner);
        debug!(
            "Shrink: evicted {} entries in {:?}, {} remaining",
            evicted.len(),
            start.elapsed(),
            inner.entries.len()
        );
    }
    evicted
}

fn shrink_to_target(
    inner: &mut StoreInner,
    probe: &dyn MemoryProbe,
    start: Instant,
    budget: Duration,
) -> Vec<Arc<dyn Slot>> {
    let target = inner.target_usage;
    let mut footprint = inner.footprint();

    // Unknown usage never evicts
    match usage_ratio(footprint, probe.snapshot()) {
        Some(usage) if usage > target => {}
        _ => return Vec::new(),
    }

    let mut evicted = Vec::new();
    for (_, slot) in rank(inner.entries.values(), inner.strategy, start) {
        if let Some(removed) = inner.entries.remove(slot.key()) {
            footprint = footprint.saturating_sub(removed.footprint());
            evicted.push(removed);
        }

        let under_target = match usage_ratio(footprint, probe.snapshot()) {
            Some(usage) => usage <= target,
            None => true,
        };
        if under_target || start.elapsed() >= budget {
            break;
        }
    }
    evicted
}

fn shrink_expired(inner: &mut StoreInner, start: Instant, budget: Duration) -> Vec<Arc<dyn Slot>> {
    let mut evicted = Vec::new();
    for (score, slot) in rank(inner.entries.values(), inner.strategy, start) {
        if score < 0.0 {
            break;
        }
        if let Some(removed) = inner.entries.remove(slot.key()) {
            evicted.push(removed);
        }
        if start.elapsed() >= budget {
            break;
        }
    }
    evicted
}

/// Hands spare map capacity back to the allocator.
pub(crate) fn reclaim(inner: &mut StoreInner) {
    let len = inner.entries.len();
    if inner.entries.capacity() > len.saturating_mul(2).max(16) {
        inner.entries.shrink_to_fit();
    }
}
