//! # memostore
//!
//! Expiring, size-aware in-memory key-value store.
//!
//! ## Architecture
//! - **HashMap**: AHash for fast lookups (O(1))
//! - **Expiration**: sliding TTLs, cancellable tokens, forced purge scans
//! - **Eviction callbacks**: fired once per removal, for any removal cause
//!
//! One store instance can back many logical namespaces; it is deliberately
//! unaware of them. Namespacing lives entirely in the key type chosen by the
//! layer above (see the `memocache` crate).

#![warn(missing_docs)]

mod entry;
mod store;
mod token;

pub use entry::{EntryOptions, EvictionCallback, EvictionReason, Expiry};
pub use store::MemoryStore;
pub use token::ExpirationToken;
