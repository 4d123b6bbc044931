//! In-memory cache backend
//!
//! DashMap-backed implementation of [`Cache`] with lazy TTL expiry and named
//! sets. Used in development mode and by the test suites; production
//! deployments can plug any backend that honours the same contract.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info};

use super::{Cache, CacheConfig, CacheError};

/// A stored value with its optional expiry
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        Self {
            value: value.to_string(),
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub sets: usize,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory key/value + set store
pub struct MemoryCache {
    /// key -> value
    entries: DashMap<String, CacheEntry>,
    /// set name -> members
    sets: DashMap<String, HashSet<String>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Create a new cache with configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            sets: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry, dropping it if it has expired
    fn live(&self, key: &str) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            sets: self.sets.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<String, CacheError> {
        self.live(key).ok_or_else(|| CacheError::Key(key.to_string()))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        debug!(key = key, ttl_secs = ttl.as_secs(), "Cache set");
        self.entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn get_del(&self, key: &str) -> Result<String, CacheError> {
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(entry.value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::Key(key.to_string()))
            }
        }
    }

    fn del(&self, key: &str) -> Result<(), CacheError> {
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired() => Ok(()),
            _ => Err(CacheError::Key(key.to_string())),
        }
    }

    fn exists(&self, keys: &[&str]) -> Result<usize, CacheError> {
        Ok(keys.iter().filter(|k| self.live(k).is_some()).count())
    }

    fn sadd(&self, set: &str, member: &str) -> Result<(), CacheError> {
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    fn sismember(&self, set: &str, member: &str) -> Result<bool, CacheError> {
        Ok(self
            .sets
            .get(set)
            .map(|members| members.contains(member))
            .unwrap_or(false))
    }
}

/// Spawn a background task that purges expired entries
pub fn spawn_cleanup_task(cache: Arc<MemoryCache>) {
    let interval = cache.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.purge_expired();
            let stats = cache.stats();
            debug!(
                removed = removed,
                entries = stats.entries,
                sets = stats.sets,
                "Cache cleanup completed"
            );
        }
    });

    info!("Cache cleanup task started");
}
