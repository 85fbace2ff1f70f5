// ─────────────────────────────────────────────────────────────────────
// Bronx — Bounded LRU Cache
// ─────────────────────────────────────────────────────────────────────
//! Small least-recently-used cache with interior mutability.
//!
//! Capacities here are tiny (1 diffusion operator, 8 kernel slices), so
//! entries live in a `VecDeque` ordered from least to most recently
//! used and lookups are linear scans.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Inner<K, V> {
    entries: VecDeque<(K, V)>,
    stats: CacheStats,
}

/// Thread-safe LRU cache: guarded by a `parking_lot::Mutex`.
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: PartialEq, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                inner.stats.hits += 1;
                let entry = inner.entries.remove(pos)?;
                let value = entry.1.clone();
                inner.entries.push_back(entry);
                Some(value)
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace `key`, evicting the least recently used entries
    /// beyond capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.entries.iter().position(|(k, _)| *k == key) {
            inner.entries.remove(pos);
        }
        inner.entries.push_back((key, value));
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
            inner.stats.evictions += 1;
            log::debug!("lru cache evicted an entry (capacity {})", self.capacity);
        }
    }

    /// Return the cached value for `key`, computing and inserting it on a miss.
    ///
    /// The lock is not held while `compute` runs. Errors are propagated
    /// and nothing is cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let pos = inner.entries.iter().position(|(k, _)| k == key)?;
        inner.entries.remove(pos).map(|(_, v)| v)
    }

    /// Keep only entries whose key satisfies `keep`. Returns how many were dropped.
    pub fn retain_keys(&self, mut keep: impl FnMut(&K) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(k, _)| keep(k));
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}
