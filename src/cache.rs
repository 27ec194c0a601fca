//! Bounded LRU cache for lookup results.

use ahash::RandomState;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binary::GeoRecord;

/// Default cache capacity (number of entries).
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Configuration for the lookup cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub capacity: usize,
    /// Whether to enable caching.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with the specified cache capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            enabled: true,
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            capacity: 0,
            enabled: false,
        }
    }

    /// Capacity to build a cache with, or `None` if caching is off.
    pub fn effective_capacity(&self) -> Option<NonZeroUsize> {
        if self.enabled {
            NonZeroUsize::new(self.capacity)
        } else {
            None
        }
    }
}

/// A cached outcome, tagged with the database generation that produced it.
#[derive(Debug, Clone)]
struct CachedLookup {
    generation: u64,
    result: Option<GeoRecord>,
}

/// LRU cache of lookup outcomes keyed by the verbatim query string.
///
/// Misses are cached too. Keys are not normalized, so `"8.8.8.8"` and
/// `" 8.8.8.8"` occupy separate entries. Every access, including a hit,
/// updates recency order, so the whole cache sits behind one mutex.
pub struct LookupCache {
    entries: Mutex<LruCache<String, CachedLookup, RandomState>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LookupCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::with_hasher(capacity, RandomState::new())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Build a cache from configuration, or `None` if caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.effective_capacity().map(Self::new)
    }

    /// Fetch the outcome cached for `query` under `generation`.
    ///
    /// Entries from another generation are dropped and reported as misses.
    /// The outer `Option` is the cache hit, the inner one the lookup result.
    pub fn get(&self, query: &str, generation: u64) -> Option<Option<GeoRecord>> {
        let mut entries = self.entries.lock();
        let cached = entries
            .get(query)
            .map(|entry| (entry.generation, entry.result.clone()));
        match cached {
            Some((cached_generation, result)) if cached_generation == generation => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Some(_) => {
                entries.pop(query);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store the outcome for `query`, evicting the least recently used entry if full.
    pub fn insert(&self, query: &str, generation: u64, result: Option<GeoRecord>) {
        self.entries
            .lock()
            .put(query.to_string(), CachedLookup { generation, result });
    }

    /// Change the capacity, evicting least recently used entries as needed.
    pub fn resize(&self, capacity: NonZeroUsize) {
        self.entries.lock().resize(capacity);
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Snapshot of size and hit counters.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            capacity: entries.cap().get(),
            len: entries.len(),
            enabled: true,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
    /// Whether caching is enabled.
    pub enabled: bool,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that went to the database.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of cache lookups that hit (0.0 when there were none).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
