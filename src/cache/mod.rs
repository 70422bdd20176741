//! Cache Module
//!
//! Function-result memoization with pluggable scoring strategies and
//! memory-pressure-aware eviction.

mod canonical;
mod entry;
mod key;
mod memoize;
mod memory;
mod shrink;
mod size;
mod stats;
mod store;
mod strategy;


// Re-export public types
pub use entry::{CacheEntry, ComputeFn, EntryInfo};
pub use key::{CallKey, FunctionId};
pub use memoize::Memoized;
pub use memory::{
    usage_ratio, FixedMemory, MemoryProbe, MemorySnapshot, SystemMemory, RESERVED_HEADROOM,
};
pub use shrink::MAX_SHRINK_TIME;
pub use size::{estimate, try_lock_children, try_read_children, Context, DeepSizeOf};
pub use stats::{CacheInfo, CacheStats};
pub use store::{create_store, Store};
pub use strategy::{ScoreInputs, Strategy};
