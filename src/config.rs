//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{Strategy, MAX_SHRINK_TIME};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Usage ratio the store shrinks toward
    pub target_usage: f64,
    /// Scoring and eviction policy
    pub strategy: Strategy,
    /// TTL in seconds for TTL entries memoized without an explicit expiration
    pub default_ttl: u64,
    /// Wall-clock budget of one shrink pass in microseconds
    pub shrink_budget_us: u64,
    /// Background shrink task interval in seconds
    pub shrink_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `RECKON_TARGET_USAGE` - Target usage ratio (default: 0.9)
    /// - `RECKON_STRATEGY` - `dynamic`, `lru` or `ttl` (default: dynamic)
    /// - `RECKON_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `RECKON_SHRINK_BUDGET_US` - Shrink pass budget in microseconds (default: 1000)
    /// - `RECKON_SHRINK_INTERVAL` - Background shrink frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_usage: env::var("RECKON_TARGET_USAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ratio: &f64| ratio.is_finite() && *ratio >= 0.0)
                .unwrap_or(defaults.target_usage),
            strategy: env::var("RECKON_STRATEGY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strategy),
            default_ttl: env::var("RECKON_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl),
            shrink_budget_us: env::var("RECKON_SHRINK_BUDGET_US")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.shrink_budget_us),
            shrink_interval: env::var("RECKON_SHRINK_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.shrink_interval),
        }
    }

    pub fn default_expiration(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn shrink_budget(&self) -> Duration {
        Duration::from_micros(self.shrink_budget_us)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_usage: 0.9,
            strategy: Strategy::Dynamic,
            default_ttl: 300,
            shrink_budget_us: MAX_SHRINK_TIME.as_micros() as u64,
            shrink_interval: 1,
        }
    }
}
