//! Process-local cache backend.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use offline_core::{ResponseRecord, StoredResponse};

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;
use crate::storage::{CacheStorage, CacheStore};

fn poisoned<T>(_: PoisonError<T>) -> CacheError {
    CacheError::Storage("cache lock poisoned".to_string())
}

/// In-memory cache storage.
///
/// Cloning shares the same stores. Locks guard plain map operations only and
/// are never held across an await.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    stores: Arc<RwLock<BTreeMap<String, Arc<MemoryCacheStore>>>>,
}

impl MemoryCacheStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheStore>> {
        let mut stores = self.stores.write().map_err(poisoned)?;
        let store: Arc<dyn CacheStore> = stores
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCacheStore::new(name)))
            .clone();
        Ok(store)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.stores.read().map_err(poisoned)?.contains_key(name))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        Ok(self.stores.write().map_err(poisoned)?.remove(name).is_some())
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.stores.read().map_err(poisoned)?.keys().cloned().collect())
    }
}

/// One in-memory store.
///
/// A handle stays usable after its store is deleted from storage, but is
/// detached: storage no longer lists it and reopening the name starts empty.
pub struct MemoryCacheStore {
    name: String,
    entries: RwLock<BTreeMap<CacheKey, StoredResponse>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &CacheKey) -> CacheResult<Option<ResponseRecord>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).map(StoredResponse::to_response))
    }

    async fn put(&self, key: CacheKey, response: StoredResponse) -> CacheResult<()> {
        self.entries.write().map_err(poisoned)?.insert(key, response);
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(CacheKey, StoredResponse)>) -> CacheResult<()> {
        let mut guard = self.entries.write().map_err(poisoned)?;
        guard.extend(entries);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.entries.write().map_err(poisoned)?.remove(key).is_some())
    }

    async fn keys(&self) -> CacheResult<Vec<CacheKey>> {
        Ok(self.entries.read().map_err(poisoned)?.keys().cloned().collect())
    }
}
