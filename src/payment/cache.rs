//! LRU cache of consumed transaction signatures.
//!
//! Remembers signatures that have already funded a campaign so replays are
//! refused without a chain round-trip. The campaign store stays authoritative;
//! a miss here only means "ask the store".

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// LRU cache of consumed signatures.
#[derive(Clone)]
pub struct ConsumedCache {
    inner: Arc<Mutex<LruCache<String, ()>>>,
    stats: Arc<Mutex<CacheStats>>,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl ConsumedCache {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Returns `true` if the signature is known to be consumed.
    pub fn contains(&self, signature: &str) -> bool {
        let found = self.inner.lock().get(signature).is_some();

        let mut stats = self.stats.lock();
        if found {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        found
    }

    /// Record a consumed signature.
    pub fn insert(&self, signature: &str) {
        self.inner.lock().put(signature.to_string(), ());
        self.stats.lock().additions += 1;
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Get the current number of entries in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for ConsumedCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache = ConsumedCache::new();

        assert!(cache.is_empty());
        assert!(!cache.contains("sig-1"));

        cache.insert("sig-1");
        assert!(cache.contains("sig-1"));
        assert!(!cache.contains("sig-2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_stats() {
        let cache = ConsumedCache::new();

        assert!(!cache.contains("sig"));
        cache.insert("sig");
        assert!(cache.contains("sig"));

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.additions, 1);
        assert!((stats.hit_rate() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let cache = ConsumedCache::with_capacity(2);

        cache.insert("a");
        cache.insert("b");
        cache.insert("c");
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a")); // evicted
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let cache = ConsumedCache::with_capacity(0);
        cache.insert("a");
        assert_eq!(cache.len(), 1);
    }
}
