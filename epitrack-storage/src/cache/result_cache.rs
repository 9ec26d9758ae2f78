//! Memoizing result cache.
//!
//! Each key owns a slot holding a `OnceCell`. Concurrent first readers of a
//! key share the slot, so only one of them runs the computation while the
//! others wait for its value. Failed computations leave the slot empty and
//! are never cached.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{CacheConfig, CacheRead, CacheStats};

struct Slot<V> {
    created: Instant,
    value: OnceCell<(V, DateTime<Utc>)>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            created: Instant::now(),
            value: OnceCell::new(),
        }
    }

    fn is_expired(&self, config: &CacheConfig) -> bool {
        self.created.elapsed() >= config.entry_ttl
    }
}

/// Keyed memoization with TTL expiry and explicit clearing.
pub struct ResultCache<K, V>
where
    K: Eq + Hash + Clone,
{
    config: CacheConfig,
    entries: DashMap<K, Arc<Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, computing it with `compute` when
    /// the key is absent or expired.
    pub fn memoize<E, F>(&self, key: K, compute: F) -> Result<CacheRead<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot_for(key);

        if let Some((value, at)) = slot.value.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(CacheRead::from_cache(value.clone(), *at));
        }

        let mut computed = false;
        let (value, at) = slot.value.get_or_try_init(|| {
            computed = true;
            compute().map(|v| (v, Utc::now()))
        })?;

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            Ok(CacheRead::computed(value.clone(), *at))
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(CacheRead::from_cache(value.clone(), *at))
        }
    }

    /// Fetch or create the live slot for `key`. The shard lock is released
    /// before any computation runs.
    fn slot_for(&self, key: K) -> Arc<Slot<V>> {
        if self.entries.len() >= self.config.max_entries {
            self.purge_expired();
        }

        let mut entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(Slot::new()));
        if entry.is_expired(&self.config) {
            *entry = Arc::new(Slot::new());
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Arc::clone(&*entry)
    }

    /// Drop every entry. Returns how many were dropped.
    pub fn clear(&self) -> u64 {
        let dropped = self.entries.len() as u64;
        self.entries.clear();
        self.evictions.fetch_add(dropped, Ordering::Relaxed);
        dropped
    }

    /// Drop expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(&self.config));
        let dropped = before.saturating_sub(self.entries.len()) as u64;
        if dropped > 0 {
            self.evictions.fetch_add(dropped, Ordering::Relaxed);
            tracing::debug!(dropped, "Purged expired cache entries");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
