//! Registry engine components
//!
//! Leaf-first:
//!
//! - [`OwnershipEscalator`] rewrites owner and DACL of a key that denies writes
//! - [`ResourceAccessor`] opens keys, escalating and creating paths as needed
//! - [`ValueStore`] performs value-level reads and writes with cache upkeep
//! - [`StatusClassifier`] compares items with the live registry
//! - [`PrivilegedWriteFallback`] runs elevated scripts when direct writes fail
//! - [`MemoryReadCache`] memoizes lookups between writes

pub mod ownership;
pub mod privileged_write;
pub mod read_cache;
pub mod resource_accessor;
pub mod status_classifier;
pub mod value_store;

pub use ownership::OwnershipEscalator;
pub use privileged_write::PrivilegedWriteFallback;
pub use read_cache::MemoryReadCache;
pub use resource_accessor::ResourceAccessor;
pub use status_classifier::StatusClassifier;
pub use value_store::ValueStore;

use crate::config::EngineParams;
use crate::ports::command_executor::CommandExecutor;
use crate::ports::read_cache::{NoReadCache, ReadCache};
use crate::ports::registry_backend::RegistryBackend;
use std::sync::Arc;

/// The engine components wired over one backend, executor and cache
#[derive(Clone)]
pub struct RegistryEngine {
    pub store: Arc<ValueStore>,
    pub classifier: Arc<StatusClassifier>,
    pub fallback: Arc<PrivilegedWriteFallback>,
    pub cache: Arc<dyn ReadCache>,
}

impl RegistryEngine {
    /// Wire the engine. With `cache_reads` off a [`NoReadCache`] is used.
    pub fn new(
        backend: Arc<dyn RegistryBackend>,
        executor: Arc<dyn CommandExecutor>,
        params: &EngineParams,
    ) -> Self {
        let cache: Arc<dyn ReadCache> = if params.cache_reads {
            Arc::new(MemoryReadCache::new())
        } else {
            Arc::new(NoReadCache)
        };
        Self::with_cache(backend, executor, cache, params)
    }

    pub fn with_cache(
        backend: Arc<dyn RegistryBackend>,
        executor: Arc<dyn CommandExecutor>,
        cache: Arc<dyn ReadCache>,
        params: &EngineParams,
    ) -> Self {
        let accessor = Arc::new(ResourceAccessor::new(backend));
        let store = Arc::new(ValueStore::new(accessor, cache.clone()));
        let classifier = Arc::new(StatusClassifier::new(store.clone()));
        let fallback = Arc::new(PrivilegedWriteFallback::new(
            executor,
            cache.clone(),
            params.elevation.clone(),
        ));
        Self {
            store,
            classifier,
            fallback,
            cache,
        }
    }
}
