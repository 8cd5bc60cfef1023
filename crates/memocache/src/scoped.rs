//! Tenant-scoped factory composition
//!
//! Factories nest freely through key composition: a scoped factory is just a
//! tenant key plus a shared registry handing out one inner factory per
//! tenant. Neither [`CachePartition`] nor the store knows anything about
//! tenancy.

use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;

use memostore::MemoryStore;

use crate::factory::MemoizerFactory;
use crate::key::PartitionKey;
use crate::partition::{CachePartition, SharedStore};

/// Process-wide registry of per-tenant factories over one shared store
///
/// Owned explicitly and passed by `Arc` to every scoped factory, rather than
/// hiding behind a static, so tests and embedders control its lifetime.
pub struct MemoizerRegistry {
    store: Arc<SharedStore>,
    factories: DashMap<PartitionKey, Arc<MemoizerFactory>, RandomState>,
}

impl Default for MemoizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoizerRegistry {
    /// Create a registry with its own unbounded store
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    /// Create a registry over an existing store
    pub fn with_store(store: Arc<SharedStore>) -> Self {
        Self {
            store,
            factories: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// The store shared by every factory this registry hands out
    pub fn store(&self) -> Arc<SharedStore> {
        Arc::clone(&self.store)
    }

    /// Get or lazily create the factory for a tenant key
    ///
    /// One factory exists per distinct tenant; concurrent requests for the
    /// same tenant receive the same instance.
    ///
    /// # Arguments
    /// * `tenant` - Tenant identity the factory is rooted at
    ///
    /// # Returns
    /// * `Arc<MemoizerFactory>` - The tenant's factory, over the shared store
    pub fn factory_for(&self, tenant: PartitionKey) -> Arc<MemoizerFactory> {
        let factory = self.factories.entry(tenant.clone()).or_insert_with(|| {
            Arc::new(MemoizerFactory::with_key(tenant, Arc::clone(&self.store)))
        });
        Arc::clone(factory.value())
    }
}

/// A factory view bound to one tenant identity
///
/// Delegates every operation to the tenant's inner factory, whose partitions
/// live under `tenant>partition` keys. Cheap to construct per request; two
/// scoped factories for the same tenant observe identical partitions.
pub struct ScopedMemoizerFactory {
    tenant: PartitionKey,
    registry: Arc<MemoizerRegistry>,
}

impl ScopedMemoizerFactory {
    /// Scope a factory to a tenant name
    pub fn new(registry: Arc<MemoizerRegistry>, tenant: &str) -> Self {
        Self::with_tenant_key(registry, PartitionKey::named(tenant))
    }

    /// Scope a factory to an arbitrary tenant key
    pub fn with_tenant_key(registry: Arc<MemoizerRegistry>, tenant: PartitionKey) -> Self {
        Self { tenant, registry }
    }

    /// The tenant key every partition of this factory is composed under
    pub fn tenant_key(&self) -> &PartitionKey {
        &self.tenant
    }

    fn factory(&self) -> Arc<MemoizerFactory> {
        self.registry.factory_for(self.tenant.clone())
    }

    /// The tenant's root partition (named after the tenant itself)
    pub fn get_global(&self) -> Arc<CachePartition> {
        self.factory().get_global()
    }

    /// Get or create the tenant's partition for `key`
    pub fn get_or_create_partition(&self, key: PartitionKey) -> Arc<CachePartition> {
        self.factory().get_or_create_partition(key)
    }

    /// String-named convenience over [`get_or_create_partition`](Self::get_or_create_partition)
    pub fn partition(&self, name: &str) -> Arc<CachePartition> {
        self.factory().partition(name)
    }

    /// Invalidate every partition of this tenant
    pub fn invalidate_all(&self) {
        self.factory().invalidate_all();
    }

    /// Invalidate one of this tenant's partitions, if it exists
    pub fn invalidate_partition(&self, key: &PartitionKey) {
        self.factory().invalidate_partition(key);
    }

    /// Snapshot of this tenant's partitions
    pub fn partitions(&self) -> Vec<Arc<CachePartition>> {
        self.factory().partitions()
    }
}
