//! Dependency bundle shared by the controller's parts.

use std::sync::Arc;

use offline_cache::{CacheKeyBuilder, CacheStorage};
use offline_core::WorkerConfig;
use offline_fetch::NetworkFetcher;

use crate::clients::{ClientRegistry, ClientSet};

/// Everything the controller needs from its environment.
///
/// Cloning is cheap; all parts are shared.
#[derive(Clone)]
pub struct WorkerContext {
    /// Deployment configuration.
    pub config: Arc<WorkerConfig>,
    /// Named cache stores.
    pub storage: Arc<dyn CacheStorage>,
    /// Network transport.
    pub fetcher: Arc<dyn NetworkFetcher>,
    /// Open clients.
    pub clients: Arc<dyn ClientRegistry>,
    keys: CacheKeyBuilder,
}

impl WorkerContext {
    /// Create a context with an empty client registry.
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn NetworkFetcher>,
    ) -> Self {
        let keys = CacheKeyBuilder::new().headers(&config.vary_headers);
        Self {
            config: Arc::new(config),
            storage,
            fetcher,
            clients: Arc::new(ClientSet::new()),
            keys,
        }
    }

    /// Use a specific client registry.
    pub fn with_clients(mut self, clients: Arc<dyn ClientRegistry>) -> Self {
        self.clients = clients;
        self
    }

    /// The cache key builder for this deployment.
    pub fn keys(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    /// Name of the current cache store.
    pub fn store_name(&self) -> &str {
        self.config.version.as_str()
    }
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("version", &self.config.version)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}
