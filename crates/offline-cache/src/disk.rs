//! On-disk cache backend.
//!
//! Each store is one JSON file named after the percent-encoded store name.
//! Every write replaces the whole file through a temp file and a rename, so a
//! reader sees either the old or the new contents, never a torn write.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use offline_core::{ResponseRecord, StoredResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CacheResult;
use crate::key::CacheKey;
use crate::storage::{CacheStorage, CacheStore};

const STORE_EXTENSION: &str = "json";

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    key: CacheKey,
    response: StoredResponse,
}

type Entries = BTreeMap<CacheKey, StoredResponse>;

/// Cache storage persisted under a directory.
#[derive(Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DiskCacheStorage {
    /// Use `root` as the storage directory, creating it if needed.
    pub async fn open_dir(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_name(name), STORE_EXTENSION))
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheStore>> {
        let path = self.store_path(name);

        {
            let _guard = self.write_lock.lock().await;
            if !tokio::fs::try_exists(&path).await? {
                write_entries(&path, &Entries::new()).await?;
                debug!(store = name, path = %path.display(), "created cache store");
            }
        }

        Ok(Arc::new(DiskCacheStore {
            name: name.to_string(),
            path,
            write_lock: Arc::clone(&self.write_lock),
        }))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(tokio::fs::try_exists(self.store_path(name)).await?)
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.store_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = file_name.strip_suffix(".json") {
                if let Some(name) = decode_name(stem) {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }
}

/// One store file.
///
/// After the store is deleted from storage the handle is detached: reads see
/// an empty store and writes are dropped.
pub struct DiskCacheStore {
    name: String,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DiskCacheStore {
    async fn load(&self) -> CacheResult<Option<Entries>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let entries: Vec<DiskEntry> = serde_json::from_slice(&bytes)?;
                Ok(Some(
                    entries.into_iter().map(|e| (e.key, e.response)).collect(),
                ))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn modify<F>(&self, f: F) -> CacheResult<bool>
    where
        F: FnOnce(&mut Entries) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut entries) = self.load().await? else {
            debug!(store = %self.name, "write to detached cache store dropped");
            return Ok(false);
        };

        let changed = f(&mut entries);
        if changed {
            write_entries(&self.path, &entries).await?;
        }
        Ok(changed)
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_key(&self, key: &CacheKey) -> CacheResult<Option<ResponseRecord>> {
        Ok(self
            .load()
            .await?
            .and_then(|entries| entries.get(key).map(StoredResponse::to_response)))
    }

    async fn put(&self, key: CacheKey, response: StoredResponse) -> CacheResult<()> {
        self.modify(move |entries| {
            entries.insert(key, response);
            true
        })
        .await?;
        Ok(())
    }

    async fn put_all(&self, batch: Vec<(CacheKey, StoredResponse)>) -> CacheResult<()> {
        self.modify(move |entries| {
            entries.extend(batch);
            true
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        let key = key.clone();
        self.modify(move |entries| entries.remove(&key).is_some()).await
    }

    async fn keys(&self) -> CacheResult<Vec<CacheKey>> {
        Ok(self
            .load()
            .await?
            .map(|entries| entries.into_keys().collect())
            .unwrap_or_default())
    }
}

async fn write_entries(path: &Path, entries: &Entries) -> CacheResult<()> {
    let records: Vec<DiskEntry> = entries
        .iter()
        .map(|(key, response)| DiskEntry {
            key: key.clone(),
            response: response.clone(),
        })
        .collect();
    let json = serde_json::to_vec(&records)?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Percent-encode everything outside `[A-Za-z0-9._-]`.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::ResponseType;

    fn stored(body: &str) -> StoredResponse {
        StoredResponse {
            status: 200,
            response_type: ResponseType::Basic,
            headers: Default::default(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_name_encoding() {
        assert_eq!(encode_name("gearloom-pwa-v4"), "gearloom-pwa-v4");
        assert_eq!(encode_name("a/b c"), "a%2Fb%20c");
        assert_eq!(decode_name("a%2Fb%20c").as_deref(), Some("a/b c"));
        assert_eq!(decode_name("bad%2"), None);
    }

    #[tokio::test]
    async fn test_disk_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open_dir(dir.path()).await.unwrap();

        let store = storage.open("v4").await.unwrap();
        store.put(CacheKey::get("/api/price"), stored("42")).await.unwrap();

        let reopened = DiskCacheStorage::open_dir(dir.path()).await.unwrap();
        let store = reopened.open("v4").await.unwrap();
        let mut hit = store
            .match_key(&CacheKey::get("/api/price"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.text().unwrap(), "42");
    }

    #[tokio::test]
    async fn test_disk_keys_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open_dir(dir.path()).await.unwrap();
        storage.open("v2").await.unwrap();
        storage.open("v4").await.unwrap();

        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["v2".to_string(), "v4".to_string()]
        );

        assert!(storage.delete("v2").await.unwrap());
        assert!(!storage.delete("v2").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["v4".to_string()]);
    }

    #[tokio::test]
    async fn test_disk_put_all_and_entry_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open_dir(dir.path()).await.unwrap();
        let store = storage.open("v4").await.unwrap();

        store
            .put_all(vec![
                (CacheKey::get("/a"), stored("a")),
                (CacheKey::get("/b"), stored("b")),
            ])
            .await
            .unwrap();
        assert_eq!(store.len().await.unwrap(), 2);

        assert!(store.delete(&CacheKey::get("/a")).await.unwrap());
        assert_eq!(store.keys().await.unwrap(), vec![CacheKey::get("/b")]);
    }

    #[tokio::test]
    async fn test_detached_store_drops_writes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskCacheStorage::open_dir(dir.path()).await.unwrap();
        let store = storage.open("v2").await.unwrap();
        storage.delete("v2").await.unwrap();

        store.put(CacheKey::get("/x"), stored("x")).await.unwrap();
        assert!(!storage.has("v2").await.unwrap());
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
