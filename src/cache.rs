//! Identity cache for endpoint proxies
//!
//! Each endpoint owns one [`EndpointCache`]. Lookups are memoized per key in
//! a bounded LRU so repeated `get` calls hand back the same `Arc`. Any
//! mutation drops the whole cache and every cache registered downstream of
//! it; there is no per-entry invalidation.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::error::SereneResult;

/// Default number of distinct keys kept per endpoint
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Something that can be dropped wholesale
pub trait Invalidate: Send + Sync {
    fn invalidate(&self);
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single memoized value, e.g. a listing or a derived index
pub struct Memo<V> {
    value: Mutex<Option<V>>,
    generation: AtomicU64,
}

impl<V: Clone> Memo<V> {
    pub fn new() -> Self {
        Memo {
            value: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the memoized value, computing it with `fetch` on a miss.
    /// Errors are returned and never memoized.
    pub fn get_or_fetch(&self, fetch: impl FnOnce() -> SereneResult<V>) -> SereneResult<V> {
        if let Some(v) = lock(&self.value).as_ref() {
            return Ok(v.clone());
        }
        let generation = self.generation.load(Ordering::Acquire);
        let fetched = fetch()?;

        let mut slot = lock(&self.value);
        if self.generation.load(Ordering::Acquire) == generation && slot.is_none() {
            *slot = Some(fetched.clone());
        }
        Ok(fetched)
    }

    pub fn is_cached(&self) -> bool {
        lock(&self.value).is_some()
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *lock(&self.value) = None;
    }
}

impl<V: Clone> Default for Memo<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> Invalidate for Memo<V> {
    fn invalidate(&self) {
        self.clear();
    }
}

/// Hit/miss counters for one cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub invalidations: u64,
}

/// Per-endpoint identity cache
pub struct EndpointCache<T> {
    name: &'static str,
    entries: Mutex<LruCache<i64, Arc<T>>>,
    listing: Memo<Arc<[Arc<T>]>>,
    downstream: Mutex<Vec<Arc<dyn Invalidate>>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> EndpointCache<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        EndpointCache {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            listing: Memo::new(),
            downstream: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        lock(&self.entries).cap().get()
    }

    /// Cached entity for `key`, fetched with `fetch` on a miss.
    ///
    /// The lock is not held while fetching, so `fetch` may consult other
    /// caches. A fetch that races with an invalidation is returned to the
    /// caller but not cached.
    pub fn lookup(&self, key: i64, fetch: impl FnOnce() -> SereneResult<T>) -> SereneResult<Arc<T>> {
        if let Some(hit) = lock(&self.entries).get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(hit));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let generation = self.generation.load(Ordering::Acquire);
        let value = Arc::new(fetch()?);

        let mut entries = lock(&self.entries);
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("{} cache invalidated while fetching {}", self.name, key);
            return Ok(value);
        }
        if let Some(existing) = entries.get(&key) {
            return Ok(Arc::clone(existing));
        }
        entries.put(key, Arc::clone(&value));
        Ok(value)
    }

    /// Cached ordered snapshot of every entity
    pub fn listing(&self, fetch: impl FnOnce() -> SereneResult<Vec<Arc<T>>>) -> SereneResult<Arc<[Arc<T>]>> {
        self.listing.get_or_fetch(|| fetch().map(Arc::from))
    }

    /// Whether `key` is currently cached. Does not touch LRU order.
    pub fn contains(&self, key: i64) -> bool {
        lock(&self.entries).contains(&key)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a cache to be dropped whenever this one is
    pub fn add_downstream(&self, cache: Arc<dyn Invalidate>) {
        lock(&self.downstream).push(cache);
    }

    /// Drop every lookup and the listing, then cascade downstream
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        lock(&self.entries).clear();
        self.listing.clear();
        debug!("{} cache invalidated", self.name);

        let downstream: Vec<_> = lock(&self.downstream).clone();
        for cache in downstream {
            cache.invalidate();
        }
    }

    /// Run a mutating call and invalidate afterwards, even when it fails
    pub fn mutate<R>(&self, call: impl FnOnce() -> SereneResult<R>) -> SereneResult<R> {
        let out = call();
        self.clear();
        out
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
            invalidations: self.generation.load(Ordering::Relaxed),
        }
    }
}

impl<T: Send + Sync> Invalidate for EndpointCache<T> {
    fn invalidate(&self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SereneError;
    use std::cell::Cell;

    #[test]
    fn test_lookup_returns_same_arc() {
        let cache: EndpointCache<String> = EndpointCache::new("test", 4);
        let calls = Cell::new(0);
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok("one".to_string())
        };

        let a = cache.lookup(1, fetch).unwrap();
        let b = cache.lookup(1, || unreachable!()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache: EndpointCache<String> = EndpointCache::new("test", 4);
        let err = cache.lookup(7, || Err(SereneError::NotFound { kind: "Thing", key: 7 }));
        assert!(err.unwrap_err().is_not_found());
        assert!(!cache.contains(7));

        assert_eq!(*cache.lookup(7, || Ok("seven".to_string())).unwrap(), "seven");
    }

    #[test]
    fn test_lru_bound() {
        let cache: EndpointCache<i64> = EndpointCache::new("test", 2);
        for k in 0..3 {
            cache.lookup(k, || Ok(k)).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(0));
        assert!(cache.contains(2));
    }

    #[test]
    fn test_invalidate_cascades() {
        let upstream: EndpointCache<i64> = EndpointCache::new("up", 4);
        let middle = Arc::new(EndpointCache::<i64>::new("middle", 4));
        let leaf = Arc::new(EndpointCache::<i64>::new("leaf", 4));
        upstream.add_downstream(middle.clone());
        middle.add_downstream(leaf.clone());

        upstream.lookup(1, || Ok(1)).unwrap();
        middle.lookup(2, || Ok(2)).unwrap();
        leaf.lookup(3, || Ok(3)).unwrap();
        leaf.listing(|| Ok(vec![Arc::new(3)])).unwrap();

        upstream.clear();
        assert!(upstream.is_empty());
        assert!(middle.is_empty());
        assert!(leaf.is_empty());
        assert!(!leaf.listing.is_cached());
    }

    #[test]
    fn test_mutate_invalidates_on_failure() {
        let cache: EndpointCache<i64> = EndpointCache::new("test", 4);
        let first = cache.lookup(1, || Ok(1)).unwrap();

        let out: SereneResult<()> = cache.mutate(|| Err(SereneError::validation("boom")));
        assert!(out.is_err());

        let second = cache.lookup(1, || Ok(1)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_racing_fetch_not_cached() {
        let cache: EndpointCache<i64> = EndpointCache::new("test", 4);
        let value = cache
            .lookup(1, || {
                cache.clear();
                Ok(1)
            })
            .unwrap();
        assert_eq!(*value, 1);
        assert!(!cache.contains(1));
    }

    #[test]
    fn test_listing_memoized() {
        let cache: EndpointCache<i64> = EndpointCache::new("test", 4);
        let a = cache.listing(|| Ok(vec![Arc::new(1), Arc::new(2)])).unwrap();
        let b = cache.listing(|| unreachable!()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.len(), 2);
    }
}
