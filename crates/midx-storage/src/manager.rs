//! CacheStrategyManager (C11): a size- and TTL-bounded cache with a
//! configurable eviction policy and hot/cold tiering.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use midx_models::{CacheEntry, EvictionPolicy};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{StorageError, StorageResult};

/// Cumulative cache statistics surfaced through the facade's `stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_size_bytes: u64,
}

struct StoredEntry<V> {
    entry: CacheEntry,
    value: Arc<V>,
}

struct Inner<V> {
    entries: HashMap<String, StoredEntry<V>>,
    protected: HashSet<String>,
    total_size_bytes: u64,
    stats: CacheStats,
}

/// Bounded cache for intermediate preprocessing artifacts.
///
/// The value type `V` is opaque to the cache: handlers treat the borrow
/// returned by `get` as read-only, and values are immutable once inserted
/// so readers never need the manager's lock after a successful lookup.
pub struct CacheStrategyManager<V> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V> CacheStrategyManager<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                protected: HashSet::new(),
                total_size_bytes: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Mark `key` as never eligible for eviction.
    pub fn protect(&self, key: impl Into<String>) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        inner.protected.insert(key.into());
    }

    /// Fetch a value, returning `None` on a miss (including a hit on a
    /// TTL- or cold-expired entry, which is treated the same as absence).
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let now = Utc::now();
        let cold_ttl = self.config.cold_ttl_secs;

        let expired = inner.entries.get(key).is_some_and(|stored| stored.entry.is_expired(cold_ttl, now));
        if expired {
            if let Some(stored) = inner.entries.remove(key) {
                inner.total_size_bytes = inner.total_size_bytes.saturating_sub(stored.entry.size_bytes);
            }
        }

        match inner.entries.get_mut(key) {
            Some(stored) => {
                stored.entry.touch(self.config.hot_threshold);
                inner.stats.hits += 1;
                Some(stored.value.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Insert `value` under `key`, sized `size_bytes`, evicting in policy
    /// order (skipping protected entries) until it fits. Fails, leaving
    /// cache state unchanged, if it cannot be made to fit.
    pub fn put(&self, key: impl Into<String>, value: V, size_bytes: u64, ttl_secs: Option<u64>) -> StorageResult<()> {
        let key = key.into();
        let mut inner = self.inner.lock().expect("cache mutex poisoned");

        let existing_size = inner.entries.get(&key).map(|s| s.entry.size_bytes).unwrap_or(0);
        let occupied_by_others = inner.total_size_bytes.saturating_sub(existing_size);

        if occupied_by_others + size_bytes > self.config.max_size_bytes {
            self.evict_until_fits(&mut inner, occupied_by_others, size_bytes, Some(&key));
        }

        let occupied_by_others = inner.total_size_bytes.saturating_sub(existing_size);
        if occupied_by_others + size_bytes > self.config.max_size_bytes {
            return Err(StorageError::insert_failed(key));
        }

        let ttl = ttl_secs.or(Some(self.config.default_ttl_secs));
        let entry = CacheEntry::new(key.clone(), size_bytes, ttl);
        inner.total_size_bytes = inner.total_size_bytes.saturating_sub(existing_size) + size_bytes;
        inner.entries.insert(key, StoredEntry { entry, value: Arc::new(value) });
        inner.stats.total_size_bytes = inner.total_size_bytes;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        match inner.entries.remove(key) {
            Some(stored) => {
                inner.total_size_bytes = inner.total_size_bytes.saturating_sub(stored.entry.size_bytes);
                true
            }
            None => false,
        }
    }

    /// Remove every TTL-/cold-expired entry. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let now = Utc::now();
        let cold_ttl = self.config.cold_ttl_secs;
        let expired_keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, stored)| stored.entry.is_expired(cold_ttl, now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired_keys {
            if let Some(stored) = inner.entries.remove(key) {
                inner.total_size_bytes = inner.total_size_bytes.saturating_sub(stored.entry.size_bytes);
            }
        }
        if !expired_keys.is_empty() {
            debug!(count = expired_keys.len(), "cleaned up expired cache entries");
        }
        expired_keys.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        CacheStats { total_size_bytes: inner.total_size_bytes, ..inner.stats }
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.inner.lock().expect("cache mutex poisoned").total_size_bytes
    }

    /// Evict unprotected entries in policy order until `size_bytes` worth of
    /// new room exists, or nothing left to evict. `inserting_key` is
    /// excluded from eviction candidates (it is being overwritten, not new).
    fn evict_until_fits(&self, inner: &mut Inner<V>, occupied: u64, size_bytes: u64, inserting_key: Option<&str>) {
        let mut candidates: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| !inner.protected.contains(*k))
            .filter(|k| inserting_key != Some(k.as_str()))
            .cloned()
            .collect();

        candidates.sort_by(|a, b| {
            let ea = &inner.entries[a].entry;
            let eb = &inner.entries[b].entry;
            match self.config.eviction_policy {
                EvictionPolicy::Lru => ea.last_accessed.cmp(&eb.last_accessed),
                EvictionPolicy::Lfu => ea
                    .access_count
                    .cmp(&eb.access_count)
                    .then_with(|| ea.last_accessed.cmp(&eb.last_accessed)),
                EvictionPolicy::Fifo => ea.created_at.cmp(&eb.created_at),
                EvictionPolicy::Ttl => {
                    let ta = ea.ttl_secs.unwrap_or(self.config.default_ttl_secs);
                    let tb = eb.ttl_secs.unwrap_or(self.config.default_ttl_secs);
                    let remaining_a = ta as i64 - (Utc::now() - ea.created_at).num_seconds();
                    let remaining_b = tb as i64 - (Utc::now() - eb.created_at).num_seconds();
                    remaining_a.cmp(&remaining_b)
                }
            }
        });

        let mut freed = 0u64;
        let needed = (occupied + size_bytes).saturating_sub(self.config.max_size_bytes);
        for key in candidates {
            if freed >= needed {
                break;
            }
            if let Some(stored) = inner.entries.remove(&key) {
                freed += stored.entry.size_bytes;
                inner.total_size_bytes = inner.total_size_bytes.saturating_sub(stored.entry.size_bytes);
                inner.stats.evictions += 1;
                warn!(key = %key, policy = ?self.config.eviction_policy, "evicted cache entry");
            }
        }
    }
}
