//! Strategy Module
//!
//! Scoring policies for cache entries. A store picks one strategy at
//! construction; every entry created under it inherits that strategy.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Smallest age used by the dynamic score, keeps the division finite.
const MIN_AGE_SECS: f64 = 1e-9;

// == Strategy ==
/// Eviction and scoring policy.
///
/// LRU and TTL scores rank for eviction: the highest goes first. The
/// DYNAMIC score is a retention value instead, so the lowest goes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Cheap, idle results go first: lowest `size * duration / age²`
    #[default]
    Dynamic,
    /// Least recently used goes first: `age`
    Lru,
    /// Expired entries go first: seconds past the expiry deadline
    Ttl,
}

/// Inputs of a score computation, sampled under the entry lock.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    /// Estimated footprint of the cached result in bytes
    pub size: usize,
    /// Time the original computation took
    pub duration: Duration,
    /// Monotonic instant of the last read
    pub last_used: Instant,
    /// Expiry deadline, if the entry has one
    pub expires_at: Option<Instant>,
}

impl Strategy {
    // == Score ==
    /// Scores an entry at `now`.
    pub fn score(self, inputs: &ScoreInputs, now: Instant) -> f64 {
        let age = now.saturating_duration_since(inputs.last_used).as_secs_f64();
        match self {
            Strategy::Dynamic => {
                let age = age.max(MIN_AGE_SECS);
                inputs.size as f64 * inputs.duration.as_secs_f64() / (age * age)
            }
            Strategy::Lru => age,
            Strategy::Ttl => match inputs.expires_at {
                Some(deadline) if now >= deadline => (now - deadline).as_secs_f64(),
                Some(deadline) => -(deadline - now).as_secs_f64(),
                // Entries without a deadline never expire
                None => f64::NEG_INFINITY,
            },
        }
    }

    // == Eviction Order ==
    /// Orders two scores so that the entry to evict first comes first.
    pub fn eviction_cmp(self, a: f64, b: f64) -> Ordering {
        match self {
            Strategy::Dynamic => a.total_cmp(&b),
            Strategy::Lru | Strategy::Ttl => b.total_cmp(&a),
        }
    }

    // == Ratio Driven ==
    /// Whether shrinking is driven by the memory usage ratio.
    ///
    /// TTL stores shrink on expiry alone.
    pub fn is_ratio_driven(self) -> bool {
        !matches!(self, Strategy::Ttl)
    }

    /// Lowercase name, as accepted by `FromStr`.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Dynamic => "dynamic",
            Strategy::Lru => "lru",
            Strategy::Ttl => "ttl",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" | "dyn" => Ok(Strategy::Dynamic),
            "lru" => Ok(Strategy::Lru),
            "ttl" => Ok(Strategy::Ttl),
            other => Err(CacheError::UnknownStrategy(other.to_string())),
        }
    }
}
