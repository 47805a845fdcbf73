//! Cache store and storage traits.

use std::sync::Arc;

use async_trait::async_trait;
use offline_core::{ResponseRecord, StoredResponse};

use crate::error::CacheResult;
use crate::key::CacheKey;

/// A named mapping from request identity to stored response.
///
/// Writes are last-write-wins and atomic per key; concurrent writers never
/// need coordination.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The store's name.
    fn name(&self) -> &str;

    /// Look up an exact key. Each hit yields a fresh, unread response.
    async fn match_key(&self, key: &CacheKey) -> CacheResult<Option<ResponseRecord>>;

    /// Insert or replace one entry.
    async fn put(&self, key: CacheKey, response: StoredResponse) -> CacheResult<()>;

    /// Insert or replace many entries as one atomic write.
    async fn put_all(&self, entries: Vec<(CacheKey, StoredResponse)>) -> CacheResult<()>;

    /// Remove one entry. Returns whether it existed.
    async fn delete(&self, key: &CacheKey) -> CacheResult<bool>;

    /// All keys, in key order.
    async fn keys(&self) -> CacheResult<Vec<CacheKey>>;

    /// Number of entries.
    async fn len(&self) -> CacheResult<usize> {
        Ok(self.keys().await?.len())
    }
}

/// The collection of named cache stores.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a store by name, creating it if needed.
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheStore>>;

    /// Check whether a store exists.
    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Delete a whole store. Returns whether it existed.
    async fn delete(&self, name: &str) -> CacheResult<bool>;

    /// Names of all stores, sorted.
    async fn keys(&self) -> CacheResult<Vec<String>>;
}
