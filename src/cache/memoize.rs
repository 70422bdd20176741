//! Memoizing Dispatcher Module
//!
//! Wraps a function so that repeated calls with equivalent arguments are
//! answered from a [`Store`].

use std::any::type_name;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::cache::entry::{CacheEntry, ComputeFn};
use crate::cache::key::{CallKey, FunctionId};
use crate::cache::size::DeepSizeOf;
use crate::cache::store::Store;

// == Memoized ==
/// A function wrapped by a store.
///
/// Cheap to clone; clones share the function identity and thus the cached
/// entries.
pub struct Memoized<A, R, E = Infallible> {
    store: Arc<Store>,
    function: ComputeFn<A, R, E>,
    id: FunctionId,
    name: Arc<str>,
    expiration: Option<Duration>,
}

impl<A, R, E> Clone for Memoized<A, R, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            function: Arc::clone(&self.function),
            id: self.id,
            name: Arc::clone(&self.name),
            expiration: self.expiration,
        }
    }
}

impl<A, R, E> fmt::Debug for Memoized<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl<A, R, E> Memoized<A, R, E>
where
    A: Serialize + Send + Sync + 'static,
    R: DeepSizeOf + Clone + Send + Sync + 'static,
    E: 'static,
{
    fn new(store: Arc<Store>, function: ComputeFn<A, R, E>, name: &str) -> Self {
        Self {
            store,
            function,
            id: FunctionId::next(),
            name: Arc::from(name),
            expiration: None,
        }
    }

    /// Gives entries created by this wrapper a time-to-live.
    ///
    /// Expired entries are recomputed on their next read.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Overrides the name used in log lines.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store backing this wrapper.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Key a call with `args` would be cached under, if it is cacheable.
    pub fn key_for(&self, args: &A) -> Option<CallKey> {
        CallKey::bind(self.id, args).ok()
    }

    // == Try Call ==
    /// Calls the function through the cache.
    ///
    /// Errors from the function are returned unchanged and never cached.
    pub fn try_call(&self, args: A) -> Result<R, E> {
        let result = self.dispatch(args);
        self.store.shrink();
        result
    }

    fn dispatch(&self, args: A) -> Result<R, E> {
        let key = match CallKey::bind(self.id, &args) {
            Ok(key) => key,
            Err(err) => {
                debug!("{}: not cacheable ({}), calling directly", self.name, err);
                self.store.record_bypass();
                return (self.function)(&args);
            }
        };

        if let Some(slot) = self.store.lookup(&key) {
            match slot.into_any().downcast::<CacheEntry<A, R, E>>() {
                Ok(entry) => return entry.res(),
                // Key spaces of different functions never overlap
                Err(_) => debug!("{}: entry type mismatch for {}", self.name, key),
            }
        }

        let start = Instant::now();
        let result = (self.function)(&args)?;
        let duration = start.elapsed();

        let entry = CacheEntry::new(
            key.clone(),
            self.store.next_seq(),
            self.store.strategy(),
            Arc::clone(&self.function),
            args,
            result.clone(),
            duration,
            self.expiration,
            self.store.default_expiration(),
        );
        self.store.insert(key, Arc::new(entry));
        Ok(result)
    }
}

impl<A, R> Memoized<A, R, Infallible>
where
    A: Serialize + Send + Sync + 'static,
    R: DeepSizeOf + Clone + Send + Sync + 'static,
{
    // == Call ==
    /// Calls an infallible function through the cache.
    pub fn call(&self, args: A) -> R {
        match self.try_call(args) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }
}

impl Store {
    // == Memoize ==
    /// Wraps an infallible function.
    pub fn memoize<A, R, F>(self: &Arc<Self>, function: F) -> Memoized<A, R>
    where
        A: Serialize + Send + Sync + 'static,
        R: DeepSizeOf + Clone + Send + Sync + 'static,
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        let name = type_name::<F>();
        Memoized::new(
            Arc::clone(self),
            Arc::new(move |args: &A| Ok(function(args))),
            name,
        )
    }

    /// Wraps a fallible function. Failed calls are not cached.
    pub fn try_memoize<A, R, E, F>(self: &Arc<Self>, function: F) -> Memoized<A, R, E>
    where
        A: Serialize + Send + Sync + 'static,
        R: DeepSizeOf + Clone + Send + Sync + 'static,
        E: 'static,
        F: Fn(&A) -> Result<R, E> + Send + Sync + 'static,
    {
        let name = type_name::<F>();
        Memoized::new(Arc::clone(self), Arc::new(function), name)
    }
}
