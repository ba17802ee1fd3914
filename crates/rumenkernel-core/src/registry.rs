//! Kernel registry.
//!
//! The registry records the metadata of every kernel a crate exposes so the
//! catalogue can be listed and looked up by ID or domain.

use crate::domain::Domain;
use crate::error::{KernelError, Result};
use crate::kernel::KernelMetadata;
use hashbrown::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Registry statistics.
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Total number of registered kernels.
    pub total: usize,
    /// Kernels by domain.
    pub by_domain: HashMap<Domain, usize>,
}

/// Central registry for all kernels.
#[derive(Debug, Default)]
pub struct KernelRegistry {
    kernels: RwLock<HashMap<String, KernelMetadata>>,
}

impl KernelRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel.
    pub fn register(&self, metadata: KernelMetadata) -> Result<()> {
        let id = metadata.id.clone();
        let mut kernels = self.kernels.write().unwrap_or_else(PoisonError::into_inner);

        if kernels.contains_key(&id) {
            return Err(KernelError::KernelAlreadyRegistered(id));
        }

        debug!(kernel_id = %id, domain = %metadata.domain, "Registering kernel");
        kernels.insert(id, metadata);
        Ok(())
    }

    /// Get a kernel by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<KernelMetadata> {
        let kernels = self.kernels.read().unwrap_or_else(PoisonError::into_inner);
        kernels.get(id).cloned()
    }

    /// Get a kernel by ID or fail with `KernelNotFound`.
    pub fn require(&self, id: &str) -> Result<KernelMetadata> {
        self.get(id).ok_or_else(|| KernelError::not_found(id))
    }

    /// Check if a kernel exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        let kernels = self.kernels.read().unwrap_or_else(PoisonError::into_inner);
        kernels.contains_key(id)
    }

    /// Get all kernel IDs, sorted.
    #[must_use]
    pub fn all_kernel_ids(&self) -> Vec<String> {
        let kernels = self.kernels.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = kernels.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get kernels by domain, sorted by ID.
    #[must_use]
    pub fn by_domain(&self, domain: Domain) -> Vec<KernelMetadata> {
        let kernels = self.kernels.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<KernelMetadata> = kernels
            .values()
            .filter(|m| m.domain == domain)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let kernels = self.kernels.read().unwrap_or_else(PoisonError::into_inner);

        let mut by_domain: HashMap<Domain, usize> = HashMap::new();
        for metadata in kernels.values() {
            *by_domain.entry(metadata.domain).or_default() += 1;
        }

        RegistryStats {
            total: kernels.len(),
            by_domain,
        }
    }

    /// Total number of registered kernels.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.kernels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Unregister a kernel by ID.
    pub fn unregister(&self, id: &str) -> bool {
        let mut kernels = self.kernels.write().unwrap_or_else(PoisonError::into_inner);
        if kernels.remove(id).is_some() {
            debug!(kernel_id = %id, "Unregistered kernel");
            return true;
        }

        warn!(kernel_id = %id, "Attempted to unregister non-existent kernel");
        false
    }
}
