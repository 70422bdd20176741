//! Global Store Module
//!
//! A process-wide store, built from the environment on first use. Callers
//! that want their own lifecycle can install a store explicitly or reset
//! the handle back to a fresh default.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;

use crate::cache::{CacheInfo, DeepSizeOf, Memoized, Store};
use crate::config::Config;
use crate::error::Result;

static GLOBAL: Lazy<RwLock<Arc<Store>>> = Lazy::new(|| RwLock::new(Arc::new(fresh())));

fn fresh() -> Store {
    let config = Config::from_env();
    info!(
        "Global store initialized: strategy={}, target_usage={}",
        config.strategy, config.target_usage
    );
    Store::new(&config)
}

/// Current global store.
pub fn store() -> Arc<Store> {
    Arc::clone(&GLOBAL.read())
}

/// Replaces the global store, returning the previous one.
///
/// Wrappers created before the swap keep using the store they were created
/// with.
pub fn install(store: Store) -> Arc<Store> {
    std::mem::replace(&mut *GLOBAL.write(), Arc::new(store))
}

/// Replaces the global store with a fresh one built from the environment.
pub fn reset() -> Arc<Store> {
    install(fresh())
}

/// Wraps an infallible function with the global store.
pub fn memoize<A, R, F>(function: F) -> Memoized<A, R>
where
    A: Serialize + Send + Sync + 'static,
    R: DeepSizeOf + Clone + Send + Sync + 'static,
    F: Fn(&A) -> R + Send + Sync + 'static,
{
    store().memoize(function)
}

/// Wraps a fallible function with the global store.
pub fn try_memoize<A, R, E, F>(function: F) -> Memoized<A, R, E>
where
    A: Serialize + Send + Sync + 'static,
    R: DeepSizeOf + Clone + Send + Sync + 'static,
    E: 'static,
    F: Fn(&A) -> std::result::Result<R, E> + Send + Sync + 'static,
{
    store().try_memoize(function)
}

pub fn info() -> CacheInfo {
    store().info()
}

pub fn clear() {
    store().clear()
}

pub fn size() -> usize {
    store().size()
}

pub fn usage() -> Option<f64> {
    store().usage()
}

pub fn shrink() -> usize {
    store().shrink()
}

pub fn set_target_usage(ratio: f64) -> Result<()> {
    store().set_target_usage(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FixedMemory, Strategy};

    // Tests share the process-wide handle, so they run as one sequence.
    #[test]
    fn test_global_lifecycle() {
        let config = Config {
            strategy: Strategy::Lru,
            target_usage: 1.0,
            ..Config::default()
        };
        install(Store::with_probe(
            &config,
            Arc::new(FixedMemory::new(1 << 30, 1 << 30)),
        ));
        assert_eq!(store().strategy(), Strategy::Lru);

        let square = memoize(|n: &u64| n * n);
        assert_eq!(square.call(9), 81);
        assert_eq!(square.call(9), 81);
        let info = info();
        assert_eq!(info.entries, 1);
        assert_eq!((info.hits, info.misses), (1, 1));
        assert!(size() > 0);
        assert!(usage().unwrap() > 0.0);

        let parse = try_memoize(|raw: &String| raw.parse::<u8>());
        assert!(parse.try_call("300".to_string()).is_err());
        assert_eq!(parse.try_call("30".to_string()), Ok(30));

        assert!(set_target_usage(-1.0).is_err());
        set_target_usage(0.0).unwrap();
        assert_eq!(shrink(), 2);

        clear();
        assert_eq!(super::info().misses, 0);

        // Old wrappers keep their store
        let previous = reset();
        assert!(Arc::ptr_eq(&previous, square.store()));
        assert!(!Arc::ptr_eq(&store(), square.store()));
    }
}
