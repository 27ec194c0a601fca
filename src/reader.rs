//! Cached database reader with hot reload support.
//!
//! This module provides the caller-facing lookup handle with:
//! - LRU cache for query results
//! - Atomic hot reload for replacing the database without downtime
//! - Thread-safe concurrent access

use arc_swap::ArcSwapOption;
use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::address::parse_ipv4;
use crate::binary::{GeoRecord, IndexStrategy};
use crate::cache::{CacheConfig, CacheStats, LookupCache};
use crate::database::Database;
use crate::error::{LoadError, QueryError};

/// Configuration for [`GeoReader`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Index strategy used for every load.
    pub strategy: IndexStrategy,
    /// Lookup cache settings.
    pub cache: CacheConfig,
}

impl ReaderConfig {
    /// Use the given index strategy.
    pub fn with_strategy(mut self, strategy: IndexStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Use the given cache settings.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// Cached database reader with hot reload support.
///
/// The loaded [`Database`] is an immutable snapshot held in an `ArcSwap`;
/// loading a new one replaces it atomically, so in-flight queries finish
/// against the snapshot they started with. A failed load leaves the
/// current snapshot in place.
///
/// # Example
///
/// ```ignore
/// use k2geo::GeoReader;
/// use std::path::Path;
///
/// let reader = GeoReader::new();
/// reader.load_file(Path::new("qqwry.dat"))?;
///
/// if let Some(record) = reader.lookup("8.8.8.8")? {
///     println!("{} {}", record.country, record.region);
/// }
/// ```
pub struct GeoReader {
    /// Current snapshot, `None` until loaded.
    inner: ArcSwapOption<Database>,
    /// LRU cache for query results.
    cache: Option<LookupCache>,
    /// Configuration.
    config: ReaderConfig,
    /// Generation counter, incremented on every load and clear.
    generation: AtomicU64,
}

impl GeoReader {
    /// Create an empty reader with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReaderConfig::default())
    }

    /// Create an empty reader with custom configuration.
    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            inner: ArcSwapOption::empty(),
            cache: LookupCache::from_config(&config.cache),
            config,
            generation: AtomicU64::new(0),
        }
    }

    /// Create a reader and load a database file with default configuration.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let reader = Self::new();
        reader.load_file(path)?;
        Ok(reader)
    }

    /// Create a reader and load a database from bytes with default configuration.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, LoadError> {
        let reader = Self::new();
        reader.load_bytes(data)?;
        Ok(reader)
    }

    /// Load (or hot reload) a database file.
    pub fn load_file(&self, path: &Path) -> Result<(), LoadError> {
        let database = Database::open(path, self.config.strategy)?;
        log::info!(
            "Loaded {:?}: {} bytes, {} segments, {} index",
            path,
            database.image().len(),
            database.segment_count(),
            self.config.strategy.name()
        );
        self.install(database);
        Ok(())
    }

    /// Load (or hot reload) a database from bytes.
    pub fn load_bytes(&self, data: Vec<u8>) -> Result<(), LoadError> {
        let database = Database::from_bytes(data, self.config.strategy)?;
        log::info!(
            "Loaded database from bytes: {} bytes, {} segments, {} index",
            database.image().len(),
            database.segment_count(),
            self.config.strategy.name()
        );
        self.install(database);
        Ok(())
    }

    /// Atomically replace the current snapshot and invalidate the cache.
    pub fn install(&self, database: Database) {
        self.swap(Some(Arc::new(database)));
    }

    /// Drop the loaded database. A later load does not need this first.
    pub fn clear(&self) {
        self.swap(None);
        log::debug!("Cleared database");
    }

    fn swap(&self, database: Option<Arc<Database>>) {
        self.inner.store(database);

        // Bump after the store so cached results tagged with an older
        // generation are never served against the new snapshot.
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Whether a database is loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.load().is_some()
    }

    /// The current snapshot.
    ///
    /// Note: the returned Arc may become stale after a hot reload.
    pub fn database(&self) -> Option<Arc<Database>> {
        self.inner.load_full()
    }

    /// Look up a dotted-quad address with caching.
    ///
    /// Returns `Ok(None)` when nothing is loaded or no range covers the address.
    pub fn lookup(&self, address: &str) -> Result<Option<GeoRecord>, QueryError> {
        let generation = self.generation.load(Ordering::SeqCst);

        // Check cache first
        if let Some(ref cache) = self.cache {
            if let Some(result) = cache.get(address, generation) {
                return Ok(result);
            }
        }

        let ip = parse_ipv4(address)?;

        // Cache miss - perform lookup
        let guard = self.inner.load();
        let Some(database) = &*guard else {
            return Ok(None);
        };
        let result = database.lookup_u32(ip);

        // Store in cache
        if let Some(ref cache) = self.cache {
            cache.insert(address, generation, result.clone());
        }

        Ok(result)
    }

    /// Look up an address string, treating malformed input as "not found".
    pub fn lookup_lossy(&self, address: &str) -> Option<GeoRecord> {
        self.lookup(address).ok().flatten()
    }

    /// Look up an address with caching.
    pub fn lookup_ip(&self, ip: Ipv4Addr) -> Option<GeoRecord> {
        self.lookup_lossy(&ip.to_string())
    }

    /// Record of the final range in the loaded database.
    pub fn last_entry(&self) -> Option<GeoRecord> {
        let guard = self.inner.load();
        guard.as_deref()?.last_entry()
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Resize the cache. Has no effect when caching is disabled.
    pub fn resize_cache(&self, capacity: NonZeroUsize) {
        if let Some(ref cache) = self.cache {
            cache.resize(capacity);
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        match self.cache {
            Some(ref cache) => cache.stats(),
            None => CacheStats::default(),
        }
    }

    /// Get the current generation (incremented on each load and clear).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

impl Default for GeoReader {
    fn default() -> Self {
        Self::new()
    }
}
