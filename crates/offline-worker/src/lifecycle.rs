//! Install and activation of one worker version.

use std::sync::{Arc, RwLock};

use futures::stream::{FuturesUnordered, StreamExt};
use offline_cache::{add_all, CacheError};
use offline_core::{LifecycleObserver, RequestRecord, WorkerPhase};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::WorkerContext;

/// Lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Manifest prefetch failed; nothing was committed.
    #[error("install of {version} failed: {source}")]
    Install {
        version: String,
        #[source]
        source: CacheError,
    },

    /// Activation requested before a successful install.
    #[error("cannot activate {version}: install has not succeeded (phase {phase})")]
    NotInstalled { version: String, phase: WorkerPhase },

    /// The event is not valid in the current phase.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: WorkerPhase, to: WorkerPhase },
}

/// What activation did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Stale stores deleted.
    pub pruned: Vec<String>,
    /// Stale stores whose deletion failed.
    pub failed: Vec<String>,
    /// Whether pruning was abandoned at the deadline.
    pub timed_out: bool,
    /// Clients that changed controller.
    pub claimed: usize,
}

/// Drives one version through install and activation.
pub struct LifecycleController {
    ctx: WorkerContext,
    phase: RwLock<WorkerPhase>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl LifecycleController {
    /// Create a controller in the `Parsed` phase.
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            phase: RwLock::new(WorkerPhase::Parsed),
            observers: Vec::new(),
        }
    }

    /// Notify `observer` of every phase change.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The current phase.
    pub fn phase(&self) -> WorkerPhase {
        self.phase.read().map(|p| *p).unwrap_or(WorkerPhase::Redundant)
    }

    fn transition(&self, next: WorkerPhase) -> Result<(), LifecycleError> {
        {
            let mut phase = self
                .phase
                .write()
                .map_err(|_| LifecycleError::InvalidTransition {
                    from: WorkerPhase::Redundant,
                    to: next,
                })?;

            if !phase.can_transition_to(next) {
                return Err(LifecycleError::InvalidTransition { from: *phase, to: next });
            }
            *phase = next;
        }

        let version = self.ctx.store_name();
        for observer in &self.observers {
            observer.on_phase(version, next);
        }
        Ok(())
    }

    /// Prefetch the manifest into the current version's store.
    ///
    /// All or nothing: on failure the store is neither created nor touched and
    /// the version becomes redundant. On success the version may activate
    /// immediately. Returns the number of entries cached.
    pub async fn install(&self) -> Result<usize, LifecycleError> {
        self.transition(WorkerPhase::Installing)?;

        let config = &self.ctx.config;
        let requests: Vec<RequestRecord> = config
            .manifest
            .iter()
            .map(|path| RequestRecord::get(config.install_url(path)))
            .collect();

        let result = add_all(
            self.ctx.storage.as_ref(),
            self.ctx.store_name(),
            self.ctx.fetcher.as_ref(),
            self.ctx.keys(),
            &requests,
        )
        .await;

        match result {
            Ok(count) => {
                self.transition(WorkerPhase::Installed)?;
                info!(version = self.ctx.store_name(), entries = count, "installed");
                Ok(count)
            }
            Err(source) => {
                warn!(version = self.ctx.store_name(), error = %source, "install failed");
                self.transition(WorkerPhase::Redundant)?;
                Err(LifecycleError::Install {
                    version: self.ctx.store_name().to_string(),
                    source,
                })
            }
        }
    }

    /// Delete every other version's store, then claim all clients.
    ///
    /// Pruning is best-effort and bounded by the configured deadline; neither
    /// a failed delete nor the deadline stops the claim.
    pub async fn activate(&self) -> Result<ActivationReport, LifecycleError> {
        let phase = self.phase();
        if phase != WorkerPhase::Installed {
            return Err(LifecycleError::NotInstalled {
                version: self.ctx.store_name().to_string(),
                phase,
            });
        }
        self.transition(WorkerPhase::Activating)?;

        let mut report = self.prune().await;

        self.transition(WorkerPhase::Activated)?;
        report.claimed = self.ctx.clients.claim(self.ctx.store_name());

        info!(
            version = self.ctx.store_name(),
            pruned = report.pruned.len(),
            failed = report.failed.len(),
            timed_out = report.timed_out,
            claimed = report.claimed,
            "activated"
        );
        Ok(report)
    }

    /// Mark this version as superseded.
    pub fn retire(&self) -> Result<(), LifecycleError> {
        self.transition(WorkerPhase::Redundant)
    }

    async fn prune(&self) -> ActivationReport {
        let mut report = ActivationReport::default();
        let storage = self.ctx.storage.as_ref();
        let version = &self.ctx.config.version;

        let names = match storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(version = %version, error = %e, "could not list cache stores");
                return report;
            }
        };

        let mut pending: FuturesUnordered<_> = names
            .into_iter()
            .filter(|name| !version.owns(name))
            .map(|name| async move {
                let result = storage.delete(&name).await;
                (name, result)
            })
            .collect();

        let deadline = self.ctx.config.prune_deadline();
        let drained = tokio::time::timeout(deadline, async {
            while let Some((name, result)) = pending.next().await {
                match result {
                    Ok(_) => {
                        info!(store = %name, "pruned stale cache store");
                        report.pruned.push(name);
                    }
                    Err(e) => {
                        warn!(store = %name, error = %e, "failed to prune cache store");
                        report.failed.push(name);
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                version = %version,
                deadline_secs = deadline.as_secs(),
                "prune deadline passed, continuing activation"
            );
            report.timed_out = true;
        }

        report.pruned.sort();
        report.failed.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_cache::{CacheKey, CacheStorage, MemoryCacheStorage};
    use offline_core::{StaticAssetManifest, VersionTag, WorkerConfig};
    use offline_fetch::{ok_response, FixtureFetcher};

    use crate::clients::ClientSet;

    fn context(
        manifest: &[&str],
        storage: &Arc<MemoryCacheStorage>,
        fetcher: &Arc<FixtureFetcher>,
    ) -> WorkerContext {
        let config = WorkerConfig::new(
            VersionTag::new("v4").unwrap(),
            StaticAssetManifest::new(manifest.iter().copied()).unwrap(),
        );
        WorkerContext::new(config, storage.clone(), fetcher.clone())
    }

    #[derive(Default)]
    struct Recorder(std::sync::Mutex<Vec<WorkerPhase>>);

    impl LifecycleObserver for Recorder {
        fn on_phase(&self, _version: &str, phase: WorkerPhase) {
            self.0.lock().unwrap().push(phase);
        }
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .with_body("/", "<html>home</html>")
                .with_body("/static/css/site.css", "body{}"),
        );
        let recorder = Arc::new(Recorder::default());
        let lifecycle = LifecycleController::new(context(&["/", "/static/css/site.css"], &storage, &fetcher))
            .with_observer(recorder.clone());

        assert_eq!(lifecycle.install().await.unwrap(), 2);
        assert_eq!(lifecycle.phase(), WorkerPhase::Installed);

        lifecycle.activate().await.unwrap();
        assert_eq!(lifecycle.phase(), WorkerPhase::Activated);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                WorkerPhase::Installing,
                WorkerPhase::Installed,
                WorkerPhase::Activating,
                WorkerPhase::Activated,
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(FixtureFetcher::new().with_body("/", "home"));
        fetcher.fail_url("/static/css/site.css");
        let lifecycle = LifecycleController::new(context(&["/", "/static/css/site.css"], &storage, &fetcher));

        let err = lifecycle.install().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Install { ref version, .. } if version == "v4"));
        assert_eq!(lifecycle.phase(), WorkerPhase::Redundant);
        assert!(!storage.has("v4").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(FixtureFetcher::new());
        let lifecycle = LifecycleController::new(context(&[], &storage, &fetcher));

        let err = lifecycle.activate().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::NotInstalled { phase: WorkerPhase::Parsed, .. }
        ));
    }

    #[tokio::test]
    async fn test_double_activate_rejected() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(FixtureFetcher::new());
        let lifecycle = LifecycleController::new(context(&[], &storage, &fetcher));
        lifecycle.install().await.unwrap();
        lifecycle.activate().await.unwrap();

        assert!(matches!(
            lifecycle.activate().await,
            Err(LifecycleError::NotInstalled { phase: WorkerPhase::Activated, .. })
        ));
    }

    #[tokio::test]
    async fn test_activate_prunes_and_claims() {
        let storage = Arc::new(MemoryCacheStorage::new());
        for old in ["v2", "v3"] {
            let store = storage.open(old).await.unwrap();
            store.put(CacheKey::get("/"), ok_response(b"old")).await.unwrap();
        }
        let fetcher = Arc::new(FixtureFetcher::new().with_body("/", "new"));
        let clients = Arc::new(ClientSet::new());
        clients.open();
        clients.open();

        let lifecycle = LifecycleController::new(
            context(&["/"], &storage, &fetcher).with_clients(clients.clone()),
        );
        lifecycle.install().await.unwrap();
        let report = lifecycle.activate().await.unwrap();

        assert_eq!(report.pruned, vec!["v2".to_string(), "v3".to_string()]);
        assert!(report.failed.is_empty());
        assert!(!report.timed_out);
        assert_eq!(report.claimed, 2);
        assert_eq!(storage.keys().await.unwrap(), vec!["v4".to_string()]);
        assert_eq!(clients.controlled_by("v4"), 2);
    }

    #[tokio::test]
    async fn test_retire_after_activation() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(FixtureFetcher::new());
        let lifecycle = LifecycleController::new(context(&[], &storage, &fetcher));
        lifecycle.install().await.unwrap();
        lifecycle.activate().await.unwrap();

        lifecycle.retire().unwrap();
        assert_eq!(lifecycle.phase(), WorkerPhase::Redundant);
    }

    #[tokio::test]
    async fn test_reinstall_while_installed_rejected() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fetcher = Arc::new(FixtureFetcher::new());
        let lifecycle = LifecycleController::new(context(&[], &storage, &fetcher));
        lifecycle.install().await.unwrap();

        assert!(matches!(
            lifecycle.install().await,
            Err(LifecycleError::InvalidTransition { from: WorkerPhase::Installed, .. })
        ));
    }
}
