//! Entry metadata: expiration policy, weight, and eviction callbacks

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::token::ExpirationToken;

/// Why an entry left the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Explicitly removed by the caller
    Removed,
    /// Overwritten by an insert under the same key
    Replaced,
    /// Sliding or immediate expiration elapsed
    Expired,
    /// The entry's expiration token was cancelled
    TokenExpired,
    /// Evicted to bring the store back under its weight bound
    Capacity,
}

/// Expiration policy for a single entry
#[derive(Debug, Clone, Copy)]
pub enum Expiry {
    /// The entry is expired from the moment it is inserted
    Immediate,
    /// Time-to-live that resets on every read
    Sliding(Duration),
}

/// Callback invoked when an entry is physically removed, for any cause
///
/// Must not panic; it runs outside the store lock and may be invoked
/// concurrently with other store operations.
pub type EvictionCallback<K, V> = Box<dyn Fn(&K, &V, EvictionReason) + Send + Sync>;

/// Per-entry configuration passed to [`MemoryStore::insert`](crate::MemoryStore::insert)
pub struct EntryOptions<K, V> {
    pub(crate) weight: u64,
    pub(crate) expiry: Expiry,
    pub(crate) token: Option<Arc<ExpirationToken>>,
    pub(crate) callbacks: Vec<EvictionCallback<K, V>>,
}

impl<K, V> Default for EntryOptions<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EntryOptions<K, V> {
    /// Create options for an unweighted entry with no expiration
    pub fn new() -> Self {
        Self {
            weight: 0,
            expiry: Expiry::Sliding(Duration::MAX),
            token: None,
            callbacks: Vec::new(),
        }
    }

    /// Set the entry's weight (byte size) counted against the store bound
    pub fn weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    /// Set the expiration policy
    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Attach an expiration token; cancelling it expires the entry
    pub fn token(mut self, token: Arc<ExpirationToken>) -> Self {
        self.token = Some(token);
        self
    }

    /// Register an eviction callback, invoked on any removal cause
    pub fn on_evict<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K, &V, EvictionReason) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }
}

/// A stored entry with its bookkeeping
pub(crate) struct Entry<K, V> {
    pub(crate) value: V,
    pub(crate) weight: u64,
    pub(crate) expiry: Expiry,
    pub(crate) deadline: Option<Instant>,
    pub(crate) token: Option<Arc<ExpirationToken>>,
    pub(crate) callbacks: Vec<EvictionCallback<K, V>>,
    pub(crate) last_access: Instant,
}

impl<K, V> Entry<K, V> {
    pub(crate) fn new(value: V, options: EntryOptions<K, V>, now: Instant) -> Self {
        // A deadline of None means the entry never expires by time alone;
        // checked_add saturates huge TTLs into "never".
        let deadline = match options.expiry {
            Expiry::Immediate => None,
            Expiry::Sliding(ttl) => now.checked_add(ttl),
        };
        Self {
            value,
            weight: options.weight,
            expiry: options.expiry,
            deadline,
            token: options.token,
            callbacks: options.callbacks,
            last_access: now,
        }
    }

    /// Whether the entry should be treated as gone
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        if matches!(self.expiry, Expiry::Immediate) {
            return true;
        }
        if let Some(token) = &self.token {
            if token.is_cancelled() {
                return true;
            }
        }
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// The reason a purge would report for this expired entry
    pub(crate) fn expiry_reason(&self) -> EvictionReason {
        match &self.token {
            Some(token) if token.is_cancelled() => EvictionReason::TokenExpired,
            _ => EvictionReason::Expired,
        }
    }

    /// Reset the sliding deadline after a read
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_access = now;
        if let Expiry::Sliding(ttl) = self.expiry {
            self.deadline = now.checked_add(ttl);
        }
    }
}
