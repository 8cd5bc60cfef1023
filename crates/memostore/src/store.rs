//! Expiring key-value store implementation
//!
//! A single `MemoryStore` may back many logical namespaces at once; it knows
//! nothing about them. Isolation is the caller's concern, carried entirely by
//! the key type.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use ahash::RandomState;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::entry::{Entry, EntryOptions, EvictionReason};

/// Map plus the running weight of everything in it, guarded as one unit
struct Inner<K, V> {
    map: HashMap<K, Entry<K, V>, RandomState>,
    total_weight: u64,
}

/// Thread-safe, size-aware store with per-entry expiration
///
/// Supports the full eviction surface a cache layer needs: sliding TTLs,
/// token-based bulk expiration, explicit removal, weight-bounded capacity
/// eviction, and a forced purge scan. Every physical removal fires the
/// entry's eviction callbacks exactly once, after the store lock is released.
pub struct MemoryStore<K, V> {
    inner: RwLock<Inner<K, V>>,
    max_weight: Option<u64>,
}

impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoryStore<K, V> {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: HashMap::with_hasher(RandomState::new()),
                total_weight: 0,
            }),
            max_weight: None,
        }
    }

    /// Create a store that evicts least-recently-accessed entries once the
    /// summed entry weight exceeds `max_weight`
    pub fn with_max_weight(max_weight: u64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                map: HashMap::with_hasher(RandomState::new()),
                total_weight: 0,
            }),
            max_weight: Some(max_weight),
        }
    }

    /// Number of entries physically present, expired or not
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    /// Check if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.read().map.is_empty()
    }

    /// Summed weight of all present entries
    pub fn total_weight(&self) -> u64 {
        self.inner.read().total_weight
    }
}

impl<K, V> MemoryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Get a live value, refreshing its sliding deadline
    ///
    /// An entry found expired is removed on the spot and its eviction
    /// callbacks fire before this returns `None`.
    ///
    /// # Arguments
    /// * `key` - Key to look up
    ///
    /// # Returns
    /// * `Option<V>` - Clone of the live value, or `None`
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut evicted = None;

        let value = {
            let mut inner = self.inner.write();
            let expired = match inner.map.get(key) {
                Some(entry) => entry.is_expired(now),
                None => return None,
            };

            if expired {
                if let Some(entry) = inner.map.remove(key) {
                    inner.total_weight -= entry.weight;
                    let reason = entry.expiry_reason();
                    evicted = Some((key.clone(), entry, reason));
                }
                None
            } else {
                inner.map.get_mut(key).map(|entry| {
                    entry.touch(now);
                    entry.value.clone()
                })
            }
        };

        if let Some((key, entry, reason)) = evicted {
            fire(&key, &entry, reason);
        }
        value
    }

    /// Insert or replace an entry
    ///
    /// A replaced entry's callbacks fire with [`EvictionReason::Replaced`].
    /// If the store is weight-bounded and now over its bound, the least
    /// recently accessed entries are evicted until the bound holds again.
    ///
    /// # Arguments
    /// * `key` - Key to store under
    /// * `value` - Value to store
    /// * `options` - Weight, expiration policy, and eviction callbacks
    pub fn insert(&self, key: K, value: V, options: EntryOptions<K, V>) {
        let now = Instant::now();
        let mut evicted = Vec::new();

        {
            let mut inner = self.inner.write();
            let entry = Entry::new(value, options, now);
            inner.total_weight += entry.weight;

            if let Some(old) = inner.map.insert(key.clone(), entry) {
                inner.total_weight -= old.weight;
                evicted.push((key.clone(), old, EvictionReason::Replaced));
            }

            if let Some(max) = self.max_weight {
                while inner.total_weight > max && !inner.map.is_empty() {
                    let lru = inner
                        .map
                        .iter()
                        .min_by_key(|(_, e)| e.last_access)
                        .map(|(k, _)| k.clone());
                    let Some(lru_key) = lru else { break };
                    if let Some(old) = inner.map.remove(&lru_key) {
                        inner.total_weight -= old.weight;
                        warn!(
                            "Capacity eviction: removed {} byte entry ({} of {} bytes in use)",
                            old.weight, inner.total_weight, max
                        );
                        evicted.push((lru_key, old, EvictionReason::Capacity));
                    }
                }
            }
        }

        for (key, entry, reason) in &evicted {
            fire(key, entry, *reason);
        }
    }

    /// Remove an entry, firing its callbacks with [`EvictionReason::Removed`]
    ///
    /// # Arguments
    /// * `key` - Key to remove
    ///
    /// # Returns
    /// * `bool` - Whether an entry was present
    pub fn remove(&self, key: &K) -> bool {
        let removed = {
            let mut inner = self.inner.write();
            match inner.map.remove(key) {
                Some(entry) => {
                    inner.total_weight -= entry.weight;
                    Some(entry)
                }
                None => None,
            }
        };

        match removed {
            Some(entry) => {
                fire(key, &entry, EvictionReason::Removed);
                true
            }
            None => false,
        }
    }

    /// Remove every expired entry right now instead of lazily on access
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let mut evicted = Vec::new();

        {
            let mut inner = self.inner.write();
            let expired: Vec<K> = inner
                .map
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in expired {
                if let Some(entry) = inner.map.remove(&key) {
                    inner.total_weight -= entry.weight;
                    let reason = entry.expiry_reason();
                    evicted.push((key, entry, reason));
                }
            }
        }

        if !evicted.is_empty() {
            trace!("Purged {} expired entries", evicted.len());
        }
        for (key, entry, reason) in &evicted {
            fire(key, entry, *reason);
        }
    }
}

/// Invoke an evicted entry's callbacks; always called with the lock released
fn fire<K, V>(key: &K, entry: &Entry<K, V>, reason: EvictionReason) {
    for callback in &entry.callbacks {
        callback(key, &entry.value, reason);
    }
}
