//! Cache Entry Module
//!
//! One memoized call: its inputs, its result, timing metadata and the score
//! derived from them.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::cache::key::CallKey;
use crate::cache::size::{estimate, DeepSizeOf};
use crate::cache::strategy::{ScoreInputs, Strategy};

/// Function shared between a memoized wrapper and the entries it creates.
pub type ComputeFn<A, R, E> = Arc<dyn Fn(&A) -> Result<R, E> + Send + Sync>;

// == Entry Info ==
/// Read-only snapshot of an entry, for introspection.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub key: CallKey,
    pub strategy: Strategy,
    /// Estimated footprint of the cached result and its key
    pub size: usize,
    /// Seconds the original computation took
    pub duration: f64,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Configured time-to-live in seconds
    pub expiration: Option<u64>,
}

// == Slot ==
/// Type-erased view of an entry, as held by a store.
pub(crate) trait Slot: Send + Sync {
    fn key(&self) -> &CallKey;
    /// Insertion sequence number, breaks score ties.
    fn seq(&self) -> u64;
    fn score(&self, now: Instant) -> f64;
    /// Result footprint plus key bytes.
    fn footprint(&self) -> usize;
    fn info(&self, now: Instant) -> EntryInfo;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct EntryState<R> {
    result: R,
    last_used: Instant,
    last_used_at: DateTime<Utc>,
    expires_at: Option<Instant>,
    /// Lazily computed footprint of `result`; `None` after a refresh
    size: Option<usize>,
}

impl<R: DeepSizeOf> EntryState<R> {
    fn size(&mut self) -> usize {
        *self
            .size
            .get_or_insert_with(|| estimate(&self.result))
    }
}

// == Cache Entry ==
/// A memoized call and its cached result.
pub struct CacheEntry<A, R, E> {
    key: CallKey,
    seq: u64,
    strategy: Strategy,
    function: ComputeFn<A, R, E>,
    arguments: A,
    duration: Duration,
    created_at: DateTime<Utc>,
    expiration: Option<Duration>,
    /// Serializes `res` calls, held across recomputation
    refresh: Mutex<()>,
    /// Guards the mutable fields, never held across user code
    state: Mutex<EntryState<R>>,
}

impl<A, R, E> CacheEntry<A, R, E>
where
    A: Send + Sync + 'static,
    R: DeepSizeOf + Clone + Send + Sync + 'static,
    E: 'static,
{
    // == Constructor ==
    /// Creates an entry for a result that was just computed.
    ///
    /// Under the TTL strategy an unset `expiration` falls back to
    /// `default_expiration`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        key: CallKey,
        seq: u64,
        strategy: Strategy,
        function: ComputeFn<A, R, E>,
        arguments: A,
        result: R,
        duration: Duration,
        expiration: Option<Duration>,
        default_expiration: Duration,
    ) -> Self {
        let expiration = match (strategy, expiration) {
            (Strategy::Ttl, None) => Some(default_expiration),
            (_, expiration) => expiration,
        };
        let now = Instant::now();
        let wall = Utc::now();

        Self {
            key,
            seq,
            strategy,
            function,
            arguments,
            duration,
            created_at: wall,
            expiration,
            refresh: Mutex::new(()),
            state: Mutex::new(EntryState {
                result,
                last_used: now,
                last_used_at: wall,
                expires_at: expiration.map(|ttl| now + ttl),
                size: None,
            }),
        }
    }

    // == Res ==
    /// Returns the current result, recomputing it first if it has expired.
    ///
    /// A failed recomputation is returned as-is and leaves the previous
    /// result in place, so the next read tries again.
    pub fn res(&self) -> Result<R, E> {
        let _serial = self.refresh.lock();
        let now = Instant::now();

        if self.is_expired(now) {
            let fresh = match (self.function)(&self.arguments) {
                Ok(fresh) => fresh,
                Err(err) => {
                    debug!("Refresh of {} failed, keeping previous result", self.key);
                    return Err(err);
                }
            };
            let mut state = self.state.lock();
            state.result = fresh;
            state.size = None;
            state.expires_at = self.expiration.map(|ttl| Instant::now() + ttl);
        }

        let mut state = self.state.lock();
        if now > state.last_used {
            state.last_used = now;
            state.last_used_at = Utc::now();
        }
        Ok(state.result.clone())
    }

    /// Whether the expiry deadline has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.state
            .lock()
            .expires_at
            .is_some_and(|deadline| now > deadline)
    }

    /// Estimated footprint of the cached result, computed on first use.
    pub fn size(&self) -> usize {
        self.state.lock().size()
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn score_inputs(&self) -> ScoreInputs {
        let mut state = self.state.lock();
        ScoreInputs {
            size: state.size(),
            duration: self.duration,
            last_used: state.last_used,
            expires_at: state.expires_at,
        }
    }
}

impl<A, R, E> Slot for CacheEntry<A, R, E>
where
    A: Send + Sync + 'static,
    R: DeepSizeOf + Clone + Send + Sync + 'static,
    E: 'static,
{
    fn key(&self) -> &CallKey {
        &self.key
    }

    fn seq(&self) -> u64 {
        self.seq
    }

    fn score(&self, now: Instant) -> f64 {
        self.strategy.score(&self.score_inputs(), now)
    }

    fn footprint(&self) -> usize {
        self.size() + self.key.footprint()
    }

    fn info(&self, now: Instant) -> EntryInfo {
        let inputs = self.score_inputs();
        let last_used_at = self.state.lock().last_used_at;
        EntryInfo {
            key: self.key.clone(),
            strategy: self.strategy,
            size: inputs.size + self.key.footprint(),
            duration: self.duration.as_secs_f64(),
            score: self.strategy.score(&inputs, now),
            created_at: self.created_at,
            last_used_at,
            expiration: self.expiration.map(|ttl| ttl.as_secs()),
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::FunctionId;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::sleep;

    fn counting_entry(
        strategy: Strategy,
        expiration: Option<Duration>,
        calls: Arc<AtomicUsize>,
    ) -> CacheEntry<u64, u64, Infallible> {
        let function: ComputeFn<u64, u64, Infallible> = Arc::new(move |n: &u64| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(n * n)
        });
        let key = CallKey::bind(FunctionId::next(), &3u64).unwrap();
        CacheEntry::new(
            key,
            0,
            strategy,
            function,
            3,
            9,
            Duration::from_millis(5),
            expiration,
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_res_returns_stored_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entry = counting_entry(Strategy::Dynamic, None, calls.clone());

        assert_eq!(entry.res().unwrap(), 9);
        assert_eq!(entry.res().unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ttl_strategy_defaults_expiration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entry = counting_entry(Strategy::Ttl, None, calls);
        assert_eq!(entry.expiration(), Some(Duration::from_secs(300)));

        let calls = Arc::new(AtomicUsize::new(0));
        let entry = counting_entry(Strategy::Lru, None, calls);
        assert_eq!(entry.expiration(), None);
    }

    #[test]
    fn test_res_recomputes_after_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entry = counting_entry(
            Strategy::Ttl,
            Some(Duration::from_millis(50)),
            calls.clone(),
        );

        sleep(Duration::from_millis(10));
        assert_eq!(entry.res().unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(80));
        assert_eq!(entry.res().unwrap(), 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!entry.is_expired(Instant::now()));
    }

    #[test]
    fn test_failed_refresh_keeps_previous_result() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let function: ComputeFn<u64, String, String> = Arc::new(move |_: &u64| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("backend down".to_string())
        });
        let key = CallKey::bind(FunctionId::next(), &1u64).unwrap();
        let entry = CacheEntry::new(
            key,
            0,
            Strategy::Ttl,
            function,
            1,
            "cached".to_string(),
            Duration::from_millis(1),
            Some(Duration::from_millis(10)),
            Duration::from_secs(300),
        );

        sleep(Duration::from_millis(30));
        assert_eq!(entry.res(), Err("backend down".to_string()));
        assert_eq!(entry.res(), Err("backend down".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(entry.is_expired(Instant::now()));
    }

    #[test]
    fn test_last_used_moves_forward() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entry = counting_entry(Strategy::Lru, None, calls);

        sleep(Duration::from_millis(20));
        let before = entry.score(Instant::now());
        entry.res().unwrap();
        let after = entry.score(Instant::now());
        assert!(after < before);
    }

    #[test]
    fn test_footprint_includes_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let entry = counting_entry(Strategy::Dynamic, None, calls);
        assert_eq!(entry.size(), std::mem::size_of::<u64>());
        assert!(entry.footprint() > entry.size());

        let info = entry.info(Instant::now());
        assert_eq!(info.size, entry.footprint());
        assert_eq!(info.strategy, Strategy::Dynamic);
    }
}
