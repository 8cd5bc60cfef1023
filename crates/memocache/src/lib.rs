//! # memocache
//!
//! Partitioned, in-process memoization cache over a shared expiring store.
//!
//! ## Architecture
//! - **Partitions**: logical namespaces multiplexed onto one `memostore`
//!   instance via partition-tagged keys; no per-partition storage
//! - **Invalidation**: O(1) per partition — swap a cancellable token instead
//!   of enumerating entries
//! - **Statistics**: atomic hit/miss/entry/size counters per partition,
//!   drained on snapshot
//! - **Scoping**: factories nest through key composition for tenant use
//!
//! Call-site wrappers decide what to cache and for how long; this crate is
//! the engine they run against.

#![warn(missing_docs)]

mod factory;
mod key;
mod partition;
mod scoped;
mod stats;

pub use factory::MemoizerFactory;
pub use key::{CallKey, PartitionKey, PartitionObjectKey};
pub use partition::{CacheEntryOptions, CachePartition, CacheValue, SharedStore};
pub use scoped::{MemoizerRegistry, ScopedMemoizerFactory};
pub use stats::CacheStatistics;

pub use memostore::{EvictionReason, ExpirationToken, Expiry, MemoryStore};
