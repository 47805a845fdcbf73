//! Per-class response strategies.

use offline_cache::{CacheKey, CacheStatus};
use offline_core::{RequestClass, RequestRecord, ResponseRecord};
use offline_fetch::FetchError;
use tracing::{debug, warn};

use crate::context::WorkerContext;

/// Result of running a strategy.
///
/// Strategies never return errors; every failure mode is one of these.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A response was produced.
    Served {
        response: ResponseRecord,
        status: CacheStatus,
    },
    /// Resolved without a response; the page sees a failed fetch.
    Miss,
    /// The network failed and the strategy surfaces the error.
    Failed(FetchError),
}

impl FetchOutcome {
    fn served(response: ResponseRecord, status: CacheStatus) -> Self {
        Self::Served { response, status }
    }

    /// Check whether a response was produced.
    pub fn is_served(&self) -> bool {
        matches!(self, Self::Served { .. })
    }

    /// The cache status, if a response was produced.
    pub fn status(&self) -> Option<CacheStatus> {
        match self {
            Self::Served { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The response, if one was produced.
    pub fn response(&self) -> Option<&ResponseRecord> {
        match self {
            Self::Served { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Take the response, if one was produced.
    pub fn into_response(self) -> Option<ResponseRecord> {
        match self {
            Self::Served { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Runs the strategy for a classified request against the current store.
#[derive(Debug, Clone)]
pub struct StrategyExecutor {
    ctx: WorkerContext,
}

impl StrategyExecutor {
    /// Create an executor.
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Run the strategy for `class`.
    ///
    /// Bypassed requests are never intercepted, so asking for one yields
    /// `Miss`.
    pub async fn execute(&self, class: RequestClass, request: &RequestRecord) -> FetchOutcome {
        match class {
            RequestClass::Navigation => self.navigation(request).await,
            RequestClass::StaticAsset => self.static_asset(request).await,
            RequestClass::GenericGet => self.generic_get(request).await,
            RequestClass::Bypass => FetchOutcome::Miss,
        }
    }

    /// Network first, falling back to the cached page and then the offline root.
    ///
    /// Network responses are returned as-is and never cached.
    pub async fn navigation(&self, request: &RequestRecord) -> FetchOutcome {
        let error = match self.ctx.fetcher.fetch(request).await {
            Ok(response) => return FetchOutcome::served(response, CacheStatus::Network),
            Err(e) => e,
        };

        debug!(url = request.url(), error = %error, "navigation offline, trying cache");

        if let Some(cached) = self.lookup_precached(&self.ctx.keys().build(request)).await {
            return FetchOutcome::served(cached, CacheStatus::Fallback);
        }

        if let Some(root) = self.ctx.config.offline_root() {
            let root_key = CacheKey::get(self.ctx.config.install_url(root));
            if let Some(cached) = self.lookup(&root_key).await {
                debug!(url = request.url(), root = root, "serving offline root");
                return FetchOutcome::served(cached, CacheStatus::Fallback);
            }
        }

        FetchOutcome::Miss
    }

    /// Cache first; a miss is fetched, stored and returned.
    pub async fn static_asset(&self, request: &RequestRecord) -> FetchOutcome {
        let key = self.ctx.keys().build(request);
        if let Some(cached) = self.lookup_precached(&key).await {
            return FetchOutcome::served(cached, CacheStatus::Hit);
        }

        match self.ctx.fetcher.fetch(request).await {
            Ok(response) => {
                self.store(key, &response).await;
                FetchOutcome::served(response, CacheStatus::Miss)
            }
            Err(e) => {
                warn!(url = request.url(), error = %e, "static asset unavailable");
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Cache first; only successful same-origin responses are stored.
    pub async fn generic_get(&self, request: &RequestRecord) -> FetchOutcome {
        let key = self.ctx.keys().build(request);
        if let Some(cached) = self.lookup(&key).await {
            return FetchOutcome::served(cached, CacheStatus::Hit);
        }

        match self.ctx.fetcher.fetch(request).await {
            Ok(response) if response.is_success() && response.is_basic() => {
                self.store(key, &response).await;
                FetchOutcome::served(response, CacheStatus::Miss)
            }
            Ok(response) => {
                debug!(
                    url = request.url(),
                    status = response.status(),
                    "response not cacheable"
                );
                FetchOutcome::served(response, CacheStatus::Network)
            }
            Err(e) => {
                debug!(url = request.url(), error = %e, "generic fetch failed");
                FetchOutcome::Miss
            }
        }
    }

    /// Exact match in the current store. Read errors count as a miss.
    async fn lookup(&self, key: &CacheKey) -> Option<ResponseRecord> {
        let store = match self.ctx.storage.open(self.ctx.store_name()).await {
            Ok(store) => store,
            Err(e) => {
                warn!(store = self.ctx.store_name(), error = %e, "cache open failed");
                return None;
            }
        };

        match store.match_key(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Like `lookup`, but a varied key that misses falls back to the
    /// header-less key the install step wrote.
    async fn lookup_precached(&self, key: &CacheKey) -> Option<ResponseRecord> {
        if let Some(hit) = self.lookup(key).await {
            return Some(hit);
        }
        if key.vary().is_empty() {
            return None;
        }
        self.lookup(&key.without_vary()).await
    }

    /// Store a copy of `response`. Failures are logged and dropped.
    async fn store(&self, key: CacheKey, response: &ResponseRecord) {
        let stored = match response.try_clone().and_then(ResponseRecord::into_stored) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %key, error = %e, "response not cloneable");
                return;
            }
        };

        let result = match self.ctx.storage.open(self.ctx.store_name()).await {
            Ok(store) => store.put(key.clone(), stored).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!(key = %key, "cached"),
            Err(e) => warn!(key = %key, error = %e, "cache write failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use offline_cache::{CacheStorage, MemoryCacheStorage};
    use offline_core::{ResponseType, StaticAssetManifest, StoredResponse, VersionTag, WorkerConfig};
    use offline_fetch::{ok_response, FixtureFetcher};

    struct Harness {
        storage: Arc<MemoryCacheStorage>,
        fetcher: Arc<FixtureFetcher>,
        executor: StrategyExecutor,
    }

    fn harness(config: WorkerConfig) -> Harness {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(FixtureFetcher::new());
        let ctx = WorkerContext::new(config, storage.clone(), fetcher.clone());
        Harness {
            storage,
            fetcher,
            executor: StrategyExecutor::new(ctx),
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig::new(VersionTag::new("v4").unwrap(), StaticAssetManifest::default())
    }

    async fn seed(storage: &MemoryCacheStorage, url: &str, body: &str) {
        let store = storage.open("v4").await.unwrap();
        store.put(CacheKey::get(url), ok_response(body.as_bytes())).await.unwrap();
    }

    async fn cached_len(storage: &MemoryCacheStorage) -> usize {
        storage.open("v4").await.unwrap().len().await.unwrap()
    }

    // ==================== Navigation ====================

    #[tokio::test]
    async fn test_navigation_online_not_cached() {
        let h = harness(config());
        h.fetcher.respond("/products", ok_response(b"<html>products</html>"));

        let outcome = h.executor.navigation(&RequestRecord::navigate("/products")).await;
        assert_eq!(outcome.status(), Some(CacheStatus::Network));
        assert_eq!(cached_len(&h.storage).await, 0);
    }

    #[tokio::test]
    async fn test_navigation_error_status_returned_unmodified() {
        let h = harness(config());
        let outcome = h.executor.navigation(&RequestRecord::navigate("/gone")).await;

        assert_eq!(outcome.status(), Some(CacheStatus::Network));
        assert_eq!(outcome.response().map(|r| r.status()), Some(404));
    }

    #[tokio::test]
    async fn test_navigation_offline_exact_match() {
        let h = harness(config());
        seed(&h.storage, "/products", "cached products").await;
        seed(&h.storage, "/", "cached root").await;
        h.fetcher.set_online(false);

        let outcome = h.executor.navigation(&RequestRecord::navigate("/products")).await;
        assert_eq!(outcome.status(), Some(CacheStatus::Fallback));
        let mut response = outcome.into_response().unwrap();
        assert_eq!(response.text().unwrap(), "cached products");
    }

    #[tokio::test]
    async fn test_navigation_offline_root_fallback() {
        let h = harness(config());
        seed(&h.storage, "/", "cached root").await;
        h.fetcher.set_online(false);

        let outcome = h.executor.navigation(&RequestRecord::navigate("/checkout")).await;
        let mut response = outcome.into_response().unwrap();
        assert_eq!(response.text().unwrap(), "cached root");
    }

    #[tokio::test]
    async fn test_navigation_offline_root_disabled() {
        let h = harness(config().with_offline_root(""));
        seed(&h.storage, "/", "cached root").await;
        h.fetcher.set_online(false);

        let outcome = h.executor.navigation(&RequestRecord::navigate("/checkout")).await;
        assert!(matches!(outcome, FetchOutcome::Miss));
    }

    #[tokio::test]
    async fn test_navigation_offline_nothing_cached() {
        let h = harness(config());
        h.fetcher.set_online(false);

        let outcome = h.executor.navigation(&RequestRecord::navigate("/checkout")).await;
        assert!(matches!(outcome, FetchOutcome::Miss));
    }

    // ==================== Static assets ====================

    #[tokio::test]
    async fn test_static_hit_skips_network() {
        let h = harness(config());
        seed(&h.storage, "/static/css/site.css", "body{}").await;

        let outcome = h
            .executor
            .static_asset(&RequestRecord::get("/static/css/site.css"))
            .await;
        assert_eq!(outcome.status(), Some(CacheStatus::Hit));
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_static_miss_refills() {
        let h = harness(config());
        h.fetcher.respond("/static/js/app.js", ok_response(b"app()"));

        let request = RequestRecord::get("/static/js/app.js");
        let outcome = h.executor.static_asset(&request).await;
        assert_eq!(outcome.status(), Some(CacheStatus::Miss));
        let mut response = outcome.into_response().unwrap();
        assert_eq!(response.text().unwrap(), "app()");

        let again = h.executor.static_asset(&request).await;
        assert_eq!(again.status(), Some(CacheStatus::Hit));
        assert_eq!(h.fetcher.call_count("/static/js/app.js"), 1);
    }

    #[tokio::test]
    async fn test_static_offline_miss_fails() {
        let h = harness(config());
        h.fetcher.set_online(false);

        let outcome = h.executor.static_asset(&RequestRecord::get("/static/js/app.js")).await;
        assert!(matches!(outcome, FetchOutcome::Failed(FetchError::Connection(_))));
    }

    // ==================== Generic GET ====================

    #[tokio::test]
    async fn test_generic_basic_success_cached() {
        let h = harness(config());
        h.fetcher.respond("/api/price", ok_response(b"42"));

        let outcome = h.executor.generic_get(&RequestRecord::get("/api/price")).await;
        assert_eq!(outcome.status(), Some(CacheStatus::Miss));
        assert_eq!(cached_len(&h.storage).await, 1);
    }

    #[tokio::test]
    async fn test_generic_error_status_not_cached() {
        let h = harness(config());

        let outcome = h.executor.generic_get(&RequestRecord::get("/api/missing")).await;
        assert_eq!(outcome.status(), Some(CacheStatus::Network));
        assert_eq!(outcome.response().map(|r| r.status()), Some(404));
        assert_eq!(cached_len(&h.storage).await, 0);
    }

    #[tokio::test]
    async fn test_generic_cross_origin_not_cached() {
        let h = harness(config());
        h.fetcher.respond(
            "https://cdn.example.com/font.woff2",
            StoredResponse {
                status: 200,
                response_type: ResponseType::Cors,
                headers: Default::default(),
                body: b"font".to_vec(),
            },
        );

        let outcome = h
            .executor
            .generic_get(&RequestRecord::get("https://cdn.example.com/font.woff2"))
            .await;
        assert_eq!(outcome.status(), Some(CacheStatus::Network));
        assert_eq!(cached_len(&h.storage).await, 0);
    }

    #[tokio::test]
    async fn test_generic_offline_uncached_is_miss() {
        let h = harness(config());
        h.fetcher.set_online(false);

        let outcome = h.executor.generic_get(&RequestRecord::get("/api/price")).await;
        assert!(matches!(outcome, FetchOutcome::Miss));
    }

    #[tokio::test]
    async fn test_vary_header_separates_entries() {
        let h = harness(config().vary_on("accept-language"));
        h.fetcher.respond("/api/copy", ok_response(b"hello"));

        let en = RequestRecord::get("/api/copy").with_header("accept-language", "en");
        let de = RequestRecord::get("/api/copy").with_header("accept-language", "de");
        h.executor.generic_get(&en).await;
        h.executor.generic_get(&de).await;
        h.executor.generic_get(&en).await;

        assert_eq!(h.fetcher.call_count("/api/copy"), 2);
        assert_eq!(cached_len(&h.storage).await, 2);
    }

    #[tokio::test]
    async fn test_bypass_class_is_miss() {
        let h = harness(config());
        let outcome = h
            .executor
            .execute(RequestClass::Bypass, &RequestRecord::get("/"))
            .await;
        assert!(matches!(outcome, FetchOutcome::Miss));
        assert_eq!(h.fetcher.total_calls(), 0);
    }
}
