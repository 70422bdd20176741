//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache-internal failures.
///
/// None of these ever reach a caller of a memoized function: errors raised by
/// the wrapped function are returned verbatim instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Arguments could not be bound into a call key
    #[error("Unhashable arguments: {0}")]
    Unhashable(String),

    /// Target usage ratio is negative or not a finite number
    #[error("Invalid target usage: {0}")]
    InvalidTargetUsage(f64),

    /// Strategy name did not match any known strategy
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
