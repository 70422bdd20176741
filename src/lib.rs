//! Reckon - In-process function-result memoization
//!
//! Caches the results of pure functions keyed by their arguments, and keeps
//! the cache's share of system memory near a target ratio by evicting
//! entries under a DYNAMIC, LRU or TTL scoring strategy.

pub mod cache;
pub mod config;
pub mod error;
pub mod global;
pub mod tasks;

pub use cache::{create_store, CacheInfo, Memoized, Store, Strategy};
pub use config::Config;
pub use error::CacheError;
pub use tasks::spawn_shrink_task;
