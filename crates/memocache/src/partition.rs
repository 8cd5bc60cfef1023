//! Cache partitions: one logical namespace over a shared store
//!
//! A partition never owns physical storage of its own. It owns a key, an
//! invalidation token, and counters; everything it stores in the shared
//! [`MemoryStore`] is keyed by a [`PartitionObjectKey`] carrying that key,
//! which is what keeps sibling partitions apart.

use std::any::Any;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use memostore::{EntryOptions, EvictionReason, ExpirationToken, Expiry, MemoryStore};

use crate::key::{CallKey, PartitionKey, PartitionObjectKey};
use crate::stats::CacheStatistics;

/// The heterogeneous value slot stored for every cache entry
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// The shared physical store multiplexed by partition-tagged keys
pub type SharedStore = MemoryStore<PartitionObjectKey, CacheValue>;

/// Entry options as instantiated for the shared store
pub type CacheEntryOptions = EntryOptions<PartitionObjectKey, CacheValue>;

/// Live counters, shared with the eviction callbacks of this partition's
/// entries. Entry count and size are signed because callbacks racing an
/// invalidation reset can briefly drive them negative; reads clamp to zero.
#[derive(Default)]
struct Counters {
    access: AtomicU64,
    misses: AtomicU64,
    entries: AtomicI64,
    size: AtomicI64,
}

/// A named view over one shared underlying store
///
/// All operations are non-throwing: presenting a key that belongs to another
/// partition yields `None`/`false`, identical to a genuine miss.
pub struct CachePartition {
    key: PartitionKey,
    store: Arc<SharedStore>,
    token: Mutex<Arc<ExpirationToken>>,
    counters: Arc<Counters>,
}

impl CachePartition {
    /// Create a partition bound to `key` over the given shared store
    pub fn new(key: PartitionKey, store: Arc<SharedStore>) -> Self {
        Self {
            key,
            store,
            token: Mutex::new(Arc::new(ExpirationToken::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// The key identifying this partition
    pub fn partition_key(&self) -> &PartitionKey {
        &self.key
    }

    /// Human-readable partition name, e.g. `Tenant1>Part1`
    pub fn display_name(&self) -> String {
        self.key.display_name()
    }

    /// Build an object key scoped to this partition from an opaque string
    pub fn key(&self, key: impl Into<Arc<str>>) -> PartitionObjectKey {
        PartitionObjectKey::opaque(self.key.clone(), key)
    }

    /// Build an object key scoped to this partition from a call identity
    pub fn object_key(&self, call: CallKey) -> PartitionObjectKey {
        PartitionObjectKey::new(self.key.clone(), call)
    }

    /// The invalidation token currently in force
    ///
    /// Callers capture this before starting a slow compute and hand it back
    /// to [`create_entry`](Self::create_entry); if an invalidation happens in
    /// between, the entry is inserted pre-expired.
    pub fn current_token(&self) -> Arc<ExpirationToken> {
        Arc::clone(&self.token.lock())
    }

    /// Look up a value under this partition
    ///
    /// Returns `None` without touching any counter if the key belongs to a
    /// different partition. A hit bumps the access count; a miss bumps both
    /// access and miss counts. A value of the wrong type counts as a miss.
    ///
    /// # Arguments
    /// * `key` - Object key built by this partition
    ///
    /// # Returns
    /// * `Option<Arc<T>>` - The cached value, or `None` on any kind of miss
    pub fn try_get<T>(&self, key: &PartitionObjectKey) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        // Prevent keys from other partitions
        if key.partition_key() != &self.key {
            return None;
        }

        self.counters.access.fetch_add(1, Ordering::Relaxed);

        if let Some(value) = self.store.get(key) {
            if let Ok(value) = value.downcast::<T>() {
                return Some(value);
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a computed value under this partition
    ///
    /// `token_before_compute` must be the token captured via
    /// [`current_token`](Self::current_token) before the value was computed.
    /// If the partition was invalidated in the meantime the entry is created
    /// already expired, so a stale compute can never resurrect old data.
    ///
    /// # Arguments
    /// * `key` - Object key built by this partition
    /// * `value` - Computed value to cache
    /// * `token_before_compute` - Token captured before computing the value
    /// * `ttl` - Sliding time-to-live
    /// * `size` - Byte size to count toward the partition, if known
    ///
    /// # Returns
    /// * `bool` - `false` on a partition-key mismatch, `true` once inserted
    pub fn create_entry<T>(
        &self,
        key: &PartitionObjectKey,
        value: T,
        token_before_compute: &Arc<ExpirationToken>,
        ttl: Duration,
        size: Option<u64>,
    ) -> bool
    where
        T: Any + Send + Sync,
    {
        self.create_entry_with(key, value, token_before_compute, ttl, size, |options| options)
    }

    /// [`create_entry`](Self::create_entry) with a hook over the entry options
    ///
    /// `configure` runs before the expiration policy is applied and may
    /// attach additional eviction callbacks.
    pub fn create_entry_with<T, F>(
        &self,
        key: &PartitionObjectKey,
        value: T,
        token_before_compute: &Arc<ExpirationToken>,
        ttl: Duration,
        size: Option<u64>,
        configure: F,
    ) -> bool
    where
        T: Any + Send + Sync,
        F: FnOnce(CacheEntryOptions) -> CacheEntryOptions,
    {
        let value: CacheValue = Arc::new(value);
        self.insert_value(key, value, token_before_compute, ttl, size, configure)
    }

    fn insert_value<F>(
        &self,
        key: &PartitionObjectKey,
        value: CacheValue,
        token_before_compute: &Arc<ExpirationToken>,
        ttl: Duration,
        size: Option<u64>,
        configure: F,
    ) -> bool
    where
        F: FnOnce(CacheEntryOptions) -> CacheEntryOptions,
    {
        // Prevent keys from other partitions
        if key.partition_key() != &self.key {
            return false;
        }

        let counters = Arc::clone(&self.counters);
        let mut options = CacheEntryOptions::new().weight(size.unwrap_or(0)).on_evict(
            move |key, _value, reason| {
                if let Some(size) = size {
                    counters.size.fetch_sub(size as i64, Ordering::Relaxed);
                }
                counters.entries.fetch_sub(1, Ordering::Relaxed);

                if reason == EvictionReason::Capacity {
                    warn!("Cache entry removed due to capacity: {}", key);
                }
            },
        );

        {
            // The token read and the expiration decision must not interleave
            // with a concurrent invalidation's token swap.
            let current = self.token.lock();
            options = configure(options);
            options = if Arc::ptr_eq(token_before_compute, &current) {
                options
                    .expiry(Expiry::Sliding(ttl))
                    .token(Arc::clone(&current))
            } else {
                // Invalidated while the value was being computed
                options.expiry(Expiry::Immediate)
            };
        }

        self.counters.entries.fetch_add(1, Ordering::Relaxed);
        if let Some(size) = size {
            self.counters.size.fetch_add(size as i64, Ordering::Relaxed);
        }

        self.store.insert(key.clone(), value, options);
        true
    }

    /// Remove an entry from this partition
    ///
    /// # Arguments
    /// * `key` - Object key built by this partition
    ///
    /// # Returns
    /// * `bool` - `false` if the key belongs to a different partition, `true`
    ///   once the removal has been applied to the shared store
    pub fn remove(&self, key: &PartitionObjectKey) -> bool {
        // Prevent keys from other partitions
        if key.partition_key() != &self.key {
            return false;
        }
        self.store.remove(key);
        true
    }

    /// Expire every entry of this partition at once, in O(1)
    ///
    /// Swaps the invalidation token, cancelling the old one so every entry of
    /// the previous generation reports expired, then forces a purge scan so
    /// they are physically removed promptly. Sibling partitions sharing the
    /// store are unaffected.
    pub fn invalidate(&self) {
        {
            let mut token = self.token.lock();
            token.cancel();
            *token = Arc::new(ExpirationToken::new());
        }

        // The purge fires eviction callbacks synchronously; reset afterwards
        // so their decrements land before the counters are zeroed.
        self.store.purge_expired();

        self.counters.entries.store(0, Ordering::Relaxed);
        self.counters.size.store(0, Ordering::Relaxed);
    }

    /// Snapshot and drain this partition's counters
    ///
    /// Access and miss counts reset to zero; entry count and size report
    /// current occupancy, clamped at zero against in-flight eviction races.
    pub fn statistics(&self) -> CacheStatistics {
        // Force an expired-entry scan so occupancy is accurate
        self.store.purge_expired();

        let access = self.counters.access.swap(0, Ordering::Relaxed);
        let misses = self.counters.misses.swap(0, Ordering::Relaxed);
        let entries = clamp_non_negative(&self.counters.entries);
        let size = clamp_non_negative(&self.counters.size);

        CacheStatistics::new(self.display_name(), access, misses, entries, size)
    }

    /// Look up or compute-and-cache a value
    ///
    /// On a miss, `compute` runs with no lock held; its error propagates
    /// untouched and nothing is inserted. The value is returned even when the
    /// insertion does not stick (e.g. an invalidation raced the compute).
    ///
    /// # Arguments
    /// * `key` - Object key built by this partition
    /// * `ttl` - Sliding time-to-live for a newly computed value
    /// * `compute` - Fallible producer, run only on a miss
    ///
    /// # Returns
    /// * `Result<Arc<T>, E>` - The cached or computed value, or the
    ///   compute error
    pub fn get_or_compute<T, E, F>(
        &self,
        key: &PartitionObjectKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.try_get::<T>(key) {
            trace!("Cache hit: {}", key);
            return Ok(value);
        }

        let token = self.current_token();
        let value = Arc::new(compute()?);
        debug!("Cache miss: {}", key);

        let cached: CacheValue = value.clone();
        self.insert_value(key, cached, &token, ttl, None, |options| options);
        Ok(value)
    }

    /// [`get_or_compute`](Self::get_or_compute) with byte-size accounting
    ///
    /// `size_of` runs after a successful compute. If it returns `None` the
    /// failure is logged as an operational error and the freshly computed
    /// value is returned uncached; the caller never loses the result.
    ///
    /// # Arguments
    /// * `key` - Object key built by this partition
    /// * `ttl` - Sliding time-to-live for a newly computed value
    /// * `size_of` - Byte-size estimator for the computed value
    /// * `compute` - Fallible producer, run only on a miss
    ///
    /// # Returns
    /// * `Result<Arc<T>, E>` - The cached or computed value, or the
    ///   compute error
    pub fn get_or_compute_sized<T, E, F, S>(
        &self,
        key: &PartitionObjectKey,
        ttl: Duration,
        size_of: S,
        compute: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T, E>,
        S: FnOnce(&T) -> Option<u64>,
    {
        if let Some(value) = self.try_get::<T>(key) {
            trace!("Cache hit: {}", key);
            return Ok(value);
        }

        let token = self.current_token();
        let value = Arc::new(compute()?);
        debug!("Cache miss: {}", key);

        match size_of(&value) {
            Some(size) => {
                let cached: CacheValue = value.clone();
                self.insert_value(key, cached, &token, ttl, Some(size), |options| options);
            }
            None => {
                error!("Failed to compute entry size, returning uncached value: {}", key);
            }
        }
        Ok(value)
    }
}

impl Drop for CachePartition {
    fn drop(&mut self) {
        // Entries of a dropped partition die with its token; the shared
        // store reclaims them on its next scan.
        self.token.lock().cancel();
    }
}

fn clamp_non_negative(counter: &AtomicI64) -> u64 {
    let value = counter.load(Ordering::Relaxed);
    if value < 0 {
        counter.store(0, Ordering::Relaxed);
        0
    } else {
        value as u64
    }
}
