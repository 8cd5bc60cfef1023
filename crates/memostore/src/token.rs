//! Cancellable expiration tokens
//!
//! A token is shared by every entry of one cache "generation". Cancelling it
//! expires the whole generation at once without touching individual entries.

use std::sync::atomic::{AtomicBool, Ordering};

/// Cancellable flag attached to cache entries
///
/// Entries holding a cancelled token are treated as expired by the store and
/// removed on the next access or purge scan.
#[derive(Debug, Default)]
pub struct ExpirationToken {
    cancelled: AtomicBool,
}

impl ExpirationToken {
    /// Create a new, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token, expiring every entry that holds it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether the token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
