//! Bounded memoization of ranked results keyed by `(query, k)`.
//!
//! Lookups use `peek`, so the recency order inside the LRU is the insertion
//! order and eviction always drops the oldest inserted entry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use recommend_types::RankedResult;
use tracing::debug;

/// Default number of cached results
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

type CacheKey = (String, usize);

/// Hit/miss/eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, RankedResult>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, RankedResult>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached result for `(query, k)`, without touching eviction order.
    pub fn get(&self, query: &str, k: usize) -> Option<RankedResult> {
        let found = self.lock().peek(&(query.to_string(), k)).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(k, "Result cache hit");
        }
        found
    }

    /// Return the cached result for `(query, k)` or compute and store it.
    ///
    /// `compute` runs outside the lock. Errors are returned as-is and never
    /// cached. When two misses race on the same key, the first stored value
    /// wins and is returned to both.
    pub fn get_or_compute<E, F>(&self, query: &str, k: usize, compute: F) -> Result<RankedResult, E>
    where
        F: FnOnce() -> Result<RankedResult, E>,
    {
        if let Some(hit) = self.get(query, k) {
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(k, "Result cache miss");
        let value = compute()?;

        let key = (query.to_string(), k);
        let mut entries = self.lock();
        if let Some(existing) = entries.peek(&key) {
            return Ok(existing.clone());
        }
        if let Some((evicted, _)) = entries.push(key, value.clone()) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(k = evicted.1, "Result cache evicted oldest entry");
        }
        Ok(value)
    }

    pub fn contains(&self, query: &str, k: usize) -> bool {
        self.lock().contains(&(query.to_string(), k))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recommend_types::CatalogItem;
    use std::cell::Cell;
    use std::sync::Arc;

    fn result(name: &str) -> RankedResult {
        RankedResult::from_ordered([(
            1.0,
            CatalogItem {
                name: name.to_string(),
                ..Default::default()
            },
        )])
    }

    fn fill(cache: &ResultCache, query: &str) {
        cache
            .get_or_compute(query, 3, || Ok::<_, ()>(result(query)))
            .unwrap();
    }

    #[test]
    fn test_second_call_is_a_hit() {
        let cache = ResultCache::new(5);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(result("Python (New)"))
        };

        let first = cache.get_or_compute("python", 3, compute).unwrap();
        let second = cache
            .get_or_compute("python", 3, || {
                calls.set(calls.get() + 1);
                Ok::<_, ()>(result("other"))
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_key_includes_k() {
        let cache = ResultCache::new(5);
        fill(&cache, "python");
        assert!(cache.contains("python", 3));
        assert!(!cache.contains("python", 4));
        assert!(!cache.contains("Python", 3));
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let cache = ResultCache::new(5);
        for q in ["q1", "q2", "q3", "q4", "q5"] {
            fill(&cache, q);
        }
        // A hit on q1 must not protect it from eviction.
        assert!(cache.get("q1", 3).is_some());

        fill(&cache, "q6");
        assert_eq!(cache.len(), 5);
        assert!(!cache.contains("q1", 3));
        for q in ["q2", "q3", "q4", "q5", "q6"] {
            assert!(cache.contains(q, 3), "{q} should still be cached");
        }
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = ResultCache::new(5);
        let err = cache.get_or_compute("python", 3, || Err::<RankedResult, _>("store down"));
        assert_eq!(err, Err("store down"));
        assert!(cache.is_empty());

        let ok = cache.get_or_compute("python", 3, || Ok::<_, &str>(result("Python (New)")));
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = ResultCache::new(0);
        assert_eq!(cache.capacity(), 1);
        fill(&cache, "a");
        fill(&cache, "b");
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b", 3));
    }

    #[test]
    fn test_concurrent_misses_store_once() {
        let cache = Arc::new(ResultCache::new(5));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .get_or_compute("shared", 3, || Ok::<_, ()>(result(&format!("r{i}"))))
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<RankedResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        let stored = cache.get("shared", 3).unwrap();
        assert!(results.iter().any(|r| *r == stored));
    }
}
