//! Partition registry: one factory, many partitions, one shared store

use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;

use crate::key::PartitionKey;
use crate::partition::{CachePartition, SharedStore};

/// Registry mapping partition keys to their partitions
///
/// A factory carries a fixed key of its own; every partition it creates lives
/// under `factory_key>partition_key`, and [`get_global`](Self::get_global)
/// returns the root partition under the bare factory key. Many factories can
/// share one physical store while keeping fully independent registries —
/// isolation is carried by the composed keys, not by separate storage.
pub struct MemoizerFactory {
    factory_key: PartitionKey,
    store: Arc<SharedStore>,
    partitions: DashMap<PartitionKey, Arc<CachePartition>, RandomState>,
}

impl MemoizerFactory {
    /// Create a factory rooted at [`PartitionKey::Global`]
    pub fn new(store: Arc<SharedStore>) -> Self {
        Self::with_key(PartitionKey::Global, store)
    }

    /// Create a factory rooted at an arbitrary key (tenant scoping)
    pub fn with_key(factory_key: PartitionKey, store: Arc<SharedStore>) -> Self {
        Self {
            factory_key,
            store,
            partitions: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// The key prefixed onto every partition this factory creates
    pub fn factory_key(&self) -> &PartitionKey {
        &self.factory_key
    }

    /// The shared store backing this factory's partitions
    pub fn store(&self) -> Arc<SharedStore> {
        Arc::clone(&self.store)
    }

    /// Get or create the root partition for this factory's own key
    pub fn get_global(&self) -> Arc<CachePartition> {
        self.partition_for(self.factory_key.clone())
    }

    /// Get or create the partition for `key`, composed under the factory key
    ///
    /// Idempotent and race-safe: concurrent callers for the same key all
    /// receive the same partition instance.
    ///
    /// # Arguments
    /// * `key` - Partition key, nested under this factory's key
    ///
    /// # Returns
    /// * `Arc<CachePartition>` - The partition, shared with all other callers
    pub fn get_or_create_partition(&self, key: PartitionKey) -> Arc<CachePartition> {
        self.partition_for(PartitionKey::composite(self.factory_key.clone(), key))
    }

    /// String-named convenience over [`get_or_create_partition`](Self::get_or_create_partition)
    pub fn partition(&self, name: &str) -> Arc<CachePartition> {
        self.get_or_create_partition(PartitionKey::named(name))
    }

    /// Invalidate every partition currently known to this factory
    pub fn invalidate_all(&self) {
        for entry in self.partitions.iter() {
            entry.value().invalidate();
        }
    }

    /// Invalidate the partition for `key` if it exists; no-op otherwise
    pub fn invalidate_partition(&self, key: &PartitionKey) {
        let effective = PartitionKey::composite(self.factory_key.clone(), key.clone());
        if let Some(partition) = self.partitions.get(&effective) {
            partition.invalidate();
        }
    }

    /// Snapshot of the partitions known at this moment
    pub fn partitions(&self) -> Vec<Arc<CachePartition>> {
        self.partitions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn partition_for(&self, effective: PartitionKey) -> Arc<CachePartition> {
        let partition = self.partitions.entry(effective.clone()).or_insert_with(|| {
            Arc::new(CachePartition::new(effective, Arc::clone(&self.store)))
        });
        Arc::clone(partition.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memostore::MemoryStore;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(600);

    fn factory() -> MemoizerFactory {
        MemoizerFactory::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_global_partition_name() {
        let f = factory();
        assert_eq!(f.get_global().display_name(), "GLOBAL");
    }

    #[test]
    fn test_partition_name_composes_factory_key() {
        let f = factory();
        let p = f.partition("Part1");
        assert_eq!(p.display_name(), "GLOBAL>Part1");
    }

    #[test]
    fn test_separate_factory_instances_have_separate_partitions() {
        let store = Arc::new(MemoryStore::new());
        let global = MemoizerFactory::new(Arc::clone(&store));
        let scoped = MemoizerFactory::with_key(PartitionKey::named("Instance1"), store);

        let p1 = global.partition("PartitionXYZ");
        let p2 = scoped.partition("PartitionXYZ");

        assert!(!Arc::ptr_eq(&p1, &p2));
        assert_eq!(p1.display_name(), "GLOBAL>PartitionXYZ");
        assert_eq!(p2.display_name(), "Instance1>PartitionXYZ");

        assert_eq!(scoped.partitions().len(), 1);
        assert!(scoped.partitions().iter().any(|p| Arc::ptr_eq(p, &p2)));
        assert!(!global.partitions().iter().any(|p| Arc::ptr_eq(p, &p2)));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let f = factory();
        let p1 = f.partition("Part1");
        let p2 = f.partition("Part1");
        assert!(Arc::ptr_eq(&p1, &p2));
    }

    #[test]
    fn test_concurrent_creation_yields_one_instance() {
        let f = Arc::new(factory());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = Arc::clone(&f);
                std::thread::spawn(move || f.partition("Shared"))
            })
            .collect();

        let partitions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for p in &partitions[1..] {
            assert!(Arc::ptr_eq(&partitions[0], p));
        }
    }

    #[test]
    fn test_partition_misses_global_cache() {
        let f = factory();
        let global = f.get_global();
        let part = f.partition("Part1");

        let global_key = global.key("Test2");
        assert!(global.create_entry(
            &global_key,
            "Value".to_string(),
            &global.current_token(),
            TTL,
            None,
        ));

        assert!(part.try_get::<String>(&global_key).is_none());
        assert!(global.try_get::<String>(&global_key).is_some());
    }

    #[test]
    fn test_invalidate_partition_leaves_siblings() {
        let f = factory();
        let a = f.partition("A");
        let b = f.partition("B");

        let key_a = a.key("K");
        let key_b = b.key("K");
        assert!(a.create_entry(&key_a, 1u32, &a.current_token(), TTL, None));
        assert!(b.create_entry(&key_b, 2u32, &b.current_token(), TTL, None));

        f.invalidate_partition(&PartitionKey::named("A"));

        assert!(a.try_get::<u32>(&key_a).is_none());
        assert!(b.try_get::<u32>(&key_b).is_some());
    }

    #[test]
    fn test_invalidate_unknown_partition_is_noop() {
        let f = factory();
        f.invalidate_partition(&PartitionKey::named("NeverCreated"));
        assert!(f.partitions().is_empty());
    }

    #[test]
    fn test_invalidate_all() {
        let f = factory();
        let a = f.partition("A");
        let b = f.partition("B");

        let key_a = a.key("K");
        let key_b = b.key("K");
        assert!(a.create_entry(&key_a, 1u32, &a.current_token(), TTL, None));
        assert!(b.create_entry(&key_b, 2u32, &b.current_token(), TTL, None));

        f.invalidate_all();

        assert!(a.try_get::<u32>(&key_a).is_none());
        assert!(b.try_get::<u32>(&key_b).is_none());
    }

    #[test]
    fn test_partitions_snapshot() {
        let f = factory();
        assert!(f.partitions().is_empty());

        let p = f.partition("P");
        let snapshot = f.partitions();
        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &p));

        // Later creations do not appear in the old snapshot
        f.partition("Q");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(f.partitions().len(), 2);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let f = factory();
        let p = f.partition("Matrix1");

        let key = p.key("Key2");
        assert!(p.create_entry(&key, "Value".to_string(), &p.current_token(), TTL, None));

        let stats = p.statistics();
        assert_eq!(
            stats,
            crate::CacheStatistics::new(p.display_name(), 0, 0, 1, 0)
        );

        let value = p.try_get::<String>(&key).unwrap();
        assert_eq!(*value, "Value");
        assert_eq!(
            p.statistics(),
            crate::CacheStatistics::new(p.display_name(), 1, 0, 1, 0)
        );

        assert!(p.try_get::<String>(&p.key("Unknown")).is_none());
        assert_eq!(
            p.statistics(),
            crate::CacheStatistics::new(p.display_name(), 1, 1, 1, 0)
        );
    }
}
