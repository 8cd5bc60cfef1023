//! Per-partition statistics snapshots

/// Immutable snapshot of one partition's counters
///
/// Produced by [`CachePartition::statistics`](crate::CachePartition::statistics).
/// Access and miss counts are drained (reset to zero) when the snapshot is
/// taken; entry count and total size reflect current occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatistics {
    id: String,
    access_count: u64,
    misses: u64,
    entry_count: u64,
    total_size: u64,
}

impl CacheStatistics {
    /// Build a snapshot from raw counter values
    pub fn new(
        id: impl Into<String>,
        access_count: u64,
        misses: u64,
        entry_count: u64,
        total_size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            access_count,
            misses,
            entry_count,
            total_size,
        }
    }

    /// Display name of the partition this snapshot describes
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lookups since the previous snapshot, hits and misses both
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Misses since the previous snapshot
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Entries currently attributed to the partition
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Bytes currently attributed to the partition
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Fraction of accesses that were hits, 0.0 when there were none
    pub fn hit_ratio(&self) -> f64 {
        if self.access_count == 0 {
            0.0
        } else {
            (self.access_count - self.misses) as f64 / self.access_count as f64
        }
    }
}
