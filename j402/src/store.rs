//! Generic key/value store backing the client audit ledger.
//!
//! The ledger only needs `get/set/has/delete/clear` with an optional
//! per-entry TTL; anything satisfying [`KeyValueStore`] can back it.
//! [`MemoryStore`] is the bundled implementation: a concurrent map with
//! lazy expiry and capacity-bounded eviction of the oldest entries.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Abstract key/value store with optional per-entry TTL.
///
/// Implementations must be safe for concurrent `get`/`set`/`delete`.
pub trait KeyValueStore<V>: Send + Sync {
    /// Returns the value for `key`, if present and not expired.
    fn get(&self, key: &str) -> Option<V>;

    /// Stores `value` under `key`, optionally expiring after `ttl`.
    fn set(&self, key: &str, value: V, ttl: Option<Duration>);

    /// Returns `true` if `key` holds an unexpired value.
    fn has(&self, key: &str) -> bool;

    /// Removes `key`. Returns `true` if an entry was present.
    fn delete(&self, key: &str) -> bool;

    /// Removes all entries.
    fn clear(&self);
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Concurrent in-memory store with capacity-bounded eviction.
///
/// Expired entries are dropped lazily on read. When an insert would exceed
/// the configured capacity, the oldest 10% of entries by insertion time are
/// evicted first.
pub struct MemoryStore<V> {
    entries: DashMap<String, Entry<V>>,
    capacity: usize,
}

impl<V> std::fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Default maximum number of entries held by a [`MemoryStore`].
pub const DEFAULT_CAPACITY: usize = 1000;

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V> {
    /// Creates a store with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a store bounded to `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "MemoryStore capacity must be non-zero");
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Returns the number of entries, including not-yet-collected expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the oldest 10% of entries by insertion time.
    fn evict_oldest(&self) {
        let drop_count = (self.capacity / 10).max(1);
        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
        for (key, _) in by_age.into_iter().take(drop_count) {
            self.entries.remove(&key);
        }
    }
}

impl<V: Clone + Send + Sync> KeyValueStore<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Drop the expired entry outside the read guard.
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key.to_owned(),
            Entry {
                value,
                inserted_at: now,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
