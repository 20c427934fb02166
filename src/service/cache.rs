//! Bounded LRU cache with per-key population
//!
//! Thread-safe, no time-based expiry. Loading a missing key is serialised per
//! key: concurrent callers for the same key wait for the first loader while
//! other keys proceed independently.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

/// A cache entry with value and access metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,
    /// When the entry was inserted
    pub created_at: Instant,
    /// Logical clock of the last access; smallest is evicted first
    last_used: u64,
    /// Number of times this entry was read
    pub access_count: u64,
}

/// Hit, miss and eviction counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Share of lookups that hit
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

struct Inner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    clock: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn touch(&mut self, key: &K) -> Option<V> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.access_count += 1;
            entry.value.clone()
        })
    }

    fn evict_lru(&mut self) -> Option<K> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&key);
        self.stats.evictions += 1;
        Some(key)
    }
}

/// Least-recently-used cache holding at most `max_size` entries
pub struct LruCache<K, V> {
    max_size: usize,
    inner: Mutex<Inner<K, V>>,
    /// One lock per key currently being populated
    loading: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache; a zero size is raised to one
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(max_size),
                clock: 0,
                stats: CacheStats::default(),
            }),
            loading: Mutex::new(HashMap::new()),
        }
    }

    /// Get an entry, marking it most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let value = inner.touch(key);
        if value.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        value
    }

    /// Insert or replace an entry, evicting the least recently used one when
    /// full. Returns the evicted key.
    pub fn insert(&self, key: K, value: V) -> Option<K> {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.last_used = clock;
            return None;
        }

        let evicted = if inner.entries.len() >= self.max_size {
            inner.evict_lru()
        } else {
            None
        };

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                last_used: clock,
                access_count: 0,
            },
        );
        evicted
    }

    /// Return the cached value or populate it with `load`.
    ///
    /// Only one loader runs per key at a time; a failed load caches nothing.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let slot = self
            .loading
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = slot.lock();

        // Another caller may have finished loading while we waited
        if let Some(value) = self.inner.lock().touch(key) {
            return Ok(value);
        }

        let outcome = load();
        if let Ok(value) = &outcome {
            self.insert(key.clone(), value.clone());
        }
        self.loading.lock().remove(key);
        outcome
    }

    /// Remove an entry
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.remove(key).map(|entry| entry.value)
    }

    /// Check if a key is cached, without touching it
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Counters since creation
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
