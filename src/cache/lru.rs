//! Bounded concurrent cache with hit/miss accounting.

use quick_cache::sync::{Cache, DefaultLifecycle};
use quick_cache::UnitWeighter;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Current number of entries.
    pub current_size: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// `quick_cache` instance plus atomic counters.
///
/// Counters are updated outside the cache's own locks, so a concurrent
/// `clear` may lose an increment. That only skews statistics.
pub(crate) struct CountingCache<K, V> {
    inner: Cache<K, V, UnitWeighter, ahash::RandomState>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> CountingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Returns `None` for a zero capacity, which disables the cache.
    pub(crate) fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }

        Some(Self {
            inner: Cache::with(
                capacity,
                capacity as u64,
                UnitWeighter,
                ahash::RandomState::new(),
                DefaultLifecycle::default(),
            ),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up `key`, counting a hit only if `valid` accepts the value.
    pub(crate) fn get_valid(&self, key: &K, valid: impl FnOnce(&V) -> bool) -> Option<V> {
        match self.inner.get(key) {
            Some(value) if valid(&value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up `key`, counting the hit or miss.
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.get_valid(key, |_| true)
    }

    pub(crate) fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Drop all entries and reset the counters.
    pub(crate) fn clear(&self) {
        self.inner.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            current_size: self.inner.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
