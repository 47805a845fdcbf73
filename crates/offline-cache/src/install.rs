//! Atomic bulk prefetch.

use futures::future::try_join_all;
use offline_core::{RequestRecord, StoredResponse};
use offline_fetch::NetworkFetcher;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::key::{CacheKey, CacheKeyBuilder};
use crate::storage::CacheStorage;

/// Fetch every request and commit all of them to the named store, or none.
///
/// Requests are fetched concurrently. Each must succeed at the transport level
/// and return a 2xx status. The store is opened only after every response is
/// in hand, and the entries are committed with a single `put_all`, so a failed
/// call neither creates the store nor leaves a partial population behind.
///
/// Returns the number of entries written.
pub async fn add_all(
    storage: &dyn CacheStorage,
    store_name: &str,
    fetcher: &dyn NetworkFetcher,
    keys: &CacheKeyBuilder,
    requests: &[RequestRecord],
) -> CacheResult<usize> {
    let fetches = requests.iter().map(|request| async move {
        let url = request.url().to_string();

        let response = fetcher
            .fetch(request)
            .await
            .map_err(|e| CacheError::Install {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(CacheError::Install {
                url,
                reason: format!("HTTP status {}", response.status()),
            });
        }

        debug!(url = %url, status = response.status(), "prefetched");
        let stored = response.into_stored()?;
        Ok::<(CacheKey, StoredResponse), CacheError>((keys.build(request), stored))
    });

    let entries = try_join_all(fetches).await?;
    let count = entries.len();

    let store = storage.open(store_name).await?;
    store.put_all(entries).await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCacheStorage;
    use offline_fetch::FixtureFetcher;

    fn requests(urls: &[&str]) -> Vec<RequestRecord> {
        urls.iter().map(|u| RequestRecord::get(*u)).collect()
    }

    #[tokio::test]
    async fn test_add_all_populates_store() {
        let storage = MemoryCacheStorage::new();
        let fetcher = FixtureFetcher::new()
            .with_body("/static/css/site.css", "css")
            .with_body("/static/img/logo.svg", "svg");

        let count = add_all(
            &storage,
            "v4",
            &fetcher,
            &CacheKeyBuilder::new(),
            &requests(&["/static/css/site.css", "/static/img/logo.svg"]),
        )
        .await
        .unwrap();

        assert_eq!(count, 2);
        let store = storage.open("v4").await.unwrap();
        assert_eq!(
            store.keys().await.unwrap(),
            vec![
                CacheKey::get("/static/css/site.css"),
                CacheKey::get("/static/img/logo.svg"),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_all_transport_failure_leaves_no_store() {
        let storage = MemoryCacheStorage::new();
        let fetcher = FixtureFetcher::new()
            .with_body("/a.css", "a")
            .with_body("/b.css", "b");
        fetcher.fail_url("/b.css");

        let result = add_all(
            &storage,
            "v4",
            &fetcher,
            &CacheKeyBuilder::new(),
            &requests(&["/a.css", "/b.css"]),
        )
        .await;

        assert!(matches!(result, Err(CacheError::Install { ref url, .. }) if url == "/b.css"));
        assert!(!storage.has("v4").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_all_error_status_fails() {
        let storage = MemoryCacheStorage::new();
        let fetcher = FixtureFetcher::new().with_body("/a.css", "a");

        let result = add_all(
            &storage,
            "v4",
            &fetcher,
            &CacheKeyBuilder::new(),
            &requests(&["/a.css", "/missing.css"]),
        )
        .await;

        assert!(matches!(result, Err(CacheError::Install { .. })));
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_all_leaves_existing_store_untouched_on_failure() {
        let storage = MemoryCacheStorage::new();
        let fetcher = FixtureFetcher::new().with_body("/a.css", "a");
        add_all(
            &storage,
            "v4",
            &fetcher,
            &CacheKeyBuilder::new(),
            &requests(&["/a.css"]),
        )
        .await
        .unwrap();

        fetcher.set_online(false);
        let result = add_all(
            &storage,
            "v4",
            &fetcher,
            &CacheKeyBuilder::new(),
            &requests(&["/a.css"]),
        )
        .await;

        assert!(result.is_err());
        let store = storage.open("v4").await.unwrap();
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_all_empty() {
        let storage = MemoryCacheStorage::new();
        let fetcher = FixtureFetcher::new();
        let count = add_all(&storage, "v4", &fetcher, &CacheKeyBuilder::new(), &[])
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(storage.has("v4").await.unwrap());
    }
}
