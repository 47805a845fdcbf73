//! The install, activate and fetch hooks.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use offline_core::{LifecycleObserver, RequestClass, RequestRecord, WorkerPhase};
use offline_observability::StrategyMetrics;
use tracing::{debug, info_span, Instrument};

use crate::classify::Classifier;
use crate::context::WorkerContext;
use crate::lifecycle::{ActivationReport, LifecycleController, LifecycleError};
use crate::strategy::{FetchOutcome, StrategyExecutor};

/// The controller's answer to a fetch event.
pub enum Interception {
    /// Not intercepted; the request takes the default network path.
    Bypass,
    /// Intercepted; the host must keep `outcome` alive until it settles.
    Respond {
        class: RequestClass,
        outcome: BoxFuture<'static, FetchOutcome>,
    },
}

impl Interception {
    /// The class of an intercepted request.
    pub fn class(&self) -> RequestClass {
        match self {
            Self::Bypass => RequestClass::Bypass,
            Self::Respond { class, .. } => *class,
        }
    }

    /// Check whether the request was intercepted.
    pub fn is_intercepted(&self) -> bool {
        matches!(self, Self::Respond { .. })
    }
}

impl std::fmt::Debug for Interception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bypass => write!(f, "Bypass"),
            Self::Respond { class, .. } => f.debug_struct("Respond").field("class", class).finish(),
        }
    }
}

/// Offline cache controller for one deployed version.
pub struct OfflineController {
    ctx: WorkerContext,
    classifier: Classifier,
    executor: StrategyExecutor,
    lifecycle: LifecycleController,
    metrics: Arc<StrategyMetrics>,
}

impl OfflineController {
    /// Create a controller.
    pub fn new(ctx: WorkerContext) -> Self {
        let metrics = Arc::new(StrategyMetrics::new());
        let lifecycle = LifecycleController::new(ctx.clone()).with_observer(metrics.clone());

        Self {
            classifier: Classifier::new(&ctx.config),
            executor: StrategyExecutor::new(ctx.clone()),
            lifecycle,
            metrics,
            ctx,
        }
    }

    /// Notify `observer` of lifecycle phase changes.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle = self.lifecycle.with_observer(observer);
        self
    }

    /// The dependency bundle.
    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Counters for this controller.
    pub fn metrics(&self) -> &Arc<StrategyMetrics> {
        &self.metrics
    }

    /// The lifecycle phase.
    pub fn phase(&self) -> WorkerPhase {
        self.lifecycle.phase()
    }

    /// Classify a request without handling it.
    pub fn classify(&self, request: &RequestRecord) -> RequestClass {
        self.classifier.classify(request)
    }

    /// Install hook: prefetch the manifest atomically.
    pub async fn on_install(&self) -> Result<usize, LifecycleError> {
        self.lifecycle
            .install()
            .instrument(info_span!("install", version = self.ctx.store_name()))
            .await
    }

    /// Activate hook: prune stale stores and claim clients.
    pub async fn on_activate(&self) -> Result<ActivationReport, LifecycleError> {
        let report = self
            .lifecycle
            .activate()
            .instrument(info_span!("activate", version = self.ctx.store_name()))
            .await?;
        self.metrics.record_prune(report.pruned.len(), report.failed.len());
        Ok(report)
    }

    /// Fetch hook.
    ///
    /// The request is classified before this returns; the returned future
    /// owns everything it needs and may outlive the controller borrow.
    pub fn on_fetch(&self, request: RequestRecord) -> Interception {
        let class = self.classifier.classify(&request);
        self.metrics.record_class(class);

        if !class.is_intercepted() {
            debug!(method = %request.method(), url = request.url(), "bypass");
            self.metrics.record_bypass();
            return Interception::Bypass;
        }

        let executor = self.executor.clone();
        let metrics = Arc::clone(&self.metrics);
        let span = info_span!("fetch", class = %class, url = request.url());

        let outcome = async move {
            let start = Instant::now();
            let outcome = executor.execute(class, &request).await;
            let elapsed = start.elapsed();

            match &outcome {
                FetchOutcome::Served { status, response } => {
                    debug!(status = %status, http_status = response.status(), "served");
                    metrics.record_served(*status, elapsed);
                }
                FetchOutcome::Miss => {
                    debug!("no response");
                    metrics.record_unanswered(elapsed);
                }
                FetchOutcome::Failed(e) => {
                    debug!(error = %e, "failed");
                    metrics.record_failure(elapsed);
                }
            }
            outcome
        }
        .instrument(span);

        Interception::Respond {
            class,
            outcome: Box::pin(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_cache::{CacheStatus, MemoryCacheStorage};
    use offline_core::{StaticAssetManifest, VersionTag, WorkerConfig};
    use offline_fetch::FixtureFetcher;

    fn controller(fetcher: Arc<FixtureFetcher>) -> OfflineController {
        let config = WorkerConfig::new(
            VersionTag::new("v4").unwrap(),
            StaticAssetManifest::new(["/static/css/site.css"]).unwrap(),
        );
        OfflineController::new(WorkerContext::new(
            config,
            Arc::new(MemoryCacheStorage::new()),
            fetcher,
        ))
    }

    #[tokio::test]
    async fn test_post_is_bypassed() {
        let fetcher = Arc::new(FixtureFetcher::new());
        let controller = controller(fetcher.clone());

        let interception = controller.on_fetch(RequestRecord::new(http::Method::POST, "/cart"));
        assert!(!interception.is_intercepted());
        assert_eq!(interception.class(), RequestClass::Bypass);
        assert_eq!(fetcher.total_calls(), 0);

        let snapshot = controller.metrics().snapshot();
        assert_eq!(snapshot.requests["bypass"], 1);
        assert_eq!(snapshot.responses["bypass"], 1);
        assert_eq!(snapshot.fetch_time_us, 0);
    }

    #[tokio::test]
    async fn test_classified_before_future_runs() {
        let fetcher = Arc::new(FixtureFetcher::new().with_body("/static/css/site.css", "css"));
        let controller = controller(fetcher.clone());

        let interception = controller.on_fetch(RequestRecord::get("/static/css/site.css"));
        assert_eq!(interception.class(), RequestClass::StaticAsset);
        assert_eq!(fetcher.total_calls(), 0);

        let Interception::Respond { outcome, .. } = interception else {
            panic!("expected interception");
        };
        assert_eq!(outcome.await.status(), Some(CacheStatus::Miss));
        assert_eq!(fetcher.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_future_outlives_controller() {
        let fetcher = Arc::new(FixtureFetcher::new().with_body("/api/price", "42"));
        let interception = controller(fetcher).on_fetch(RequestRecord::get("/api/price"));

        let Interception::Respond { outcome, .. } = interception else {
            panic!("expected interception");
        };
        let handle = tokio::spawn(outcome);
        assert!(handle.await.unwrap().is_served());
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let fetcher = Arc::new(FixtureFetcher::new());
        let controller = controller(fetcher.clone());
        fetcher.set_online(false);

        controller.on_fetch(RequestRecord::new(http::Method::DELETE, "/cart/1"));
        if let Interception::Respond { outcome, .. } =
            controller.on_fetch(RequestRecord::navigate("/checkout"))
        {
            outcome.await;
        }

        let snapshot = controller.metrics().snapshot();
        assert_eq!(snapshot.requests["bypass"], 1);
        assert_eq!(snapshot.requests["navigation"], 1);
        assert_eq!(snapshot.unanswered, 1);
    }

    #[tokio::test]
    async fn test_lifecycle_metrics() {
        let fetcher = Arc::new(FixtureFetcher::new().with_body("/static/css/site.css", "css"));
        let controller = controller(fetcher);

        controller.on_install().await.unwrap();
        controller.on_activate().await.unwrap();

        let snapshot = controller.metrics().snapshot();
        assert_eq!(snapshot.installs, 1);
        assert_eq!(snapshot.activations, 1);
        assert_eq!(controller.phase(), WorkerPhase::Activated);
    }
}
