//! Bounded map with earliest-expiry eviction.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

/// A stored value plus the instant it stops being fresh.
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Result of a lookup against the store.
pub(crate) enum Lookup<V> {
    /// Entry is present and has not reached `expires_at`.
    Fresh(V),
    /// Entry has passed `expires_at` but is still within the stale window.
    Stale(V),
    /// No usable entry: absent, or expired past the stale window.
    Miss,
}

/// Fixed-capacity key/value store that evicts the entry with the earliest
/// `expires_at` when a new key would exceed capacity.
///
/// Unlike an LRU/LFU policy keyed on access pattern, eviction order here
/// tracks which entry is closest to expiring anyway — the entry about to
/// go stale is the cheapest one to give up.
pub(crate) struct CacheStore<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    capacity: usize,
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up `key`, classifying the result as fresh, stale, or miss. An
    /// entry found expired past `stale_window` is removed.
    pub(crate) fn lookup(
        &mut self,
        key: &K,
        now: Instant,
        stale_window: Option<std::time::Duration>,
    ) -> Lookup<V> {
        let Some(entry) = self.entries.get(key) else {
            return Lookup::Miss;
        };

        if entry.expires_at > now {
            return Lookup::Fresh(entry.value.clone());
        }

        let stale_deadline = stale_window.map(|w| entry.expires_at + w);
        match stale_deadline {
            Some(deadline) if now < deadline => Lookup::Stale(entry.value.clone()),
            _ => {
                self.entries.remove(key);
                Lookup::Miss
            }
        }
    }

    /// Inserts `key` with the given expiry, evicting the entry with the
    /// earliest `expires_at` if this is a new key and the store is full.
    /// Returns the evicted key, if any. A zero-capacity store never stores
    /// anything — every subsequent lookup is a miss.
    pub(crate) fn insert(&mut self, key: K, value: V, expires_at: Instant) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }

        let is_new_key = !self.entries.contains_key(&key);
        let evicted = if is_new_key && self.entries.len() >= self.capacity {
            self.evict_earliest_expiry()
        } else {
            None
        };

        self.entries.insert(key, CacheEntry { value, expires_at });
        evicted
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes every entry expired past its stale window. Returns the
    /// number of entries swept.
    pub(crate) fn sweep_expired(
        &mut self,
        now: Instant,
        stale_window: Option<std::time::Duration>,
    ) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            let deadline = entry.expires_at + stale_window.unwrap_or_default();
            now < deadline
        });
        before - self.entries.len()
    }

    fn evict_earliest_expiry(&mut self) -> Option<K> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&key);
        Some(key)
    }
}
