//! Adapter registry: marketplace identifier → adapter.
//!
//! New backends are added by registering an adapter; the orchestrator never
//! changes. Lookups take a read lock; registration takes a write lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::adapter::MarketplaceAdapter;
use crate::error::RegistryError;
use crate::types::MarketplaceId;

/// Registry of marketplace adapters keyed by [`MarketplaceId`].
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<MarketplaceId, Arc<dyn MarketplaceAdapter>>>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under `id`, replacing any existing one.
    pub fn register(&self, id: MarketplaceId, adapter: Arc<dyn MarketplaceAdapter>) {
        if adapter.marketplace_id() != &id {
            tracing::debug!(
                marketplace = %id,
                adapter = %adapter.marketplace_id(),
                "adapter registered under a different id than it reports"
            );
        }
        let previous = self.write().insert(id.clone(), adapter);
        if previous.is_some() {
            tracing::warn!(marketplace = %id, "replacing previously registered adapter");
        } else {
            tracing::debug!(marketplace = %id, "registered adapter");
        }
    }

    /// Register an adapter under the id it reports for itself.
    pub fn register_adapter(&self, adapter: Arc<dyn MarketplaceAdapter>) {
        let id = adapter.marketplace_id().clone();
        self.register(id, adapter);
    }

    /// Look up the adapter for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if nothing is registered for `id`.
    pub fn resolve(
        &self,
        id: &MarketplaceId,
    ) -> Result<Arc<dyn MarketplaceAdapter>, RegistryError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Remove the adapter for `id`, returning it if present.
    pub fn unregister(&self, id: &MarketplaceId) -> Option<Arc<dyn MarketplaceAdapter>> {
        self.write().remove(id)
    }

    pub fn is_registered(&self, id: &MarketplaceId) -> bool {
        self.read().contains_key(id)
    }

    /// All registered ids, sorted.
    pub fn registered_ids(&self) -> Vec<MarketplaceId> {
        let mut ids: Vec<MarketplaceId> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every registered adapter, sorted by id.
    pub fn adapters(&self) -> Vec<(MarketplaceId, Arc<dyn MarketplaceAdapter>)> {
        let mut all: Vec<_> = self
            .read()
            .iter()
            .map(|(id, adapter)| (id.clone(), Arc::clone(adapter)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every critical section is a single HashMap call.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<MarketplaceId, Arc<dyn MarketplaceAdapter>>> {
        self.adapters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<MarketplaceId, Arc<dyn MarketplaceAdapter>>> {
        self.adapters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("marketplaces", &self.registered_ids())
            .finish()
    }
}
