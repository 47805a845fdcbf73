//! Scripted replay of worker events.
//!
//! A script is a JSON document listing canned network responses and a
//! sequence of events. Consecutive fetches are dispatched together and run
//! concurrently; any other event first waits for in-flight fetches to settle.
//!
//! ```json
//! {
//!   "routes": { "/api/price": { "body": "{\"price\": 42}" } },
//!   "events": [
//!     { "event": "seed", "store": "gearloom-pwa-v3", "urls": ["/"] },
//!     { "event": "install" },
//!     { "event": "activate" },
//!     { "event": "fetch", "url": "/api/price" },
//!     { "event": "network", "online": false },
//!     { "event": "fetch", "url": "/checkout", "mode": "navigate" }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use chrono::Utc;
use offline_cache::{CacheKey, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
use offline_core::{RequestMode, RequestRecord, ResponseType, StoredResponse, WorkerConfig};
use offline_fetch::FixtureFetcher;
use offline_observability::MetricsSnapshot;
use offline_worker::{
    CompletedFetch, Dispatch, EventId, FetchOutcome, OfflineController, WorkerContext, WorkerHost,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ReplayArgs;
use crate::context::Context;
use crate::output::cache_status_badge;

/// A replay script.
#[derive(Debug, Deserialize)]
pub struct ReplayScript {
    /// Worker configuration; the loaded config file is used when absent.
    #[serde(default)]
    pub worker: Option<WorkerConfig>,

    /// Canned responses by URL or path.
    #[serde(default)]
    pub routes: BTreeMap<String, RouteFixture>,

    /// Events in dispatch order.
    pub events: Vec<ScriptEvent>,
}

/// A canned network response.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteFixture {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, rename = "type")]
    pub response_type: ResponseType,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

fn default_status() -> u16 {
    200
}

impl RouteFixture {
    fn to_stored(&self) -> StoredResponse {
        StoredResponse {
            status: self.status,
            response_type: self.response_type,
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            body: self.body.as_bytes().to_vec(),
        }
    }
}

/// One scripted event.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ScriptEvent {
    /// Populate a store directly, as a previous deployment would have.
    Seed {
        store: String,
        #[serde(default)]
        urls: Vec<String>,
    },
    /// Deliver the install event.
    Install,
    /// Deliver the activate event.
    Activate,
    /// Switch the network on or off.
    Network { online: bool },
    /// Make one URL unreachable.
    Fail { url: String },
    /// Deliver a fetch event.
    Fetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

/// What one event did.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub event: String,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<String>,
}

/// Result of a whole replay.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub started_at: String,
    pub version: String,
    pub steps: Vec<StepReport>,
    pub stores: BTreeMap<String, Vec<String>>,
    pub metrics: MetricsSnapshot,
}

/// Run the replay command.
pub async fn run(args: ReplayArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.script);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read replay script: {}", path.display()))?;
    let mut script: ReplayScript = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse replay script: {}", path.display()))?;

    let worker = match script.worker.take() {
        Some(worker) => worker,
        None => ctx.require_config()?.worker.clone(),
    };
    worker.validate()?;

    let store_dir = args.store_dir.or_else(|| {
        ctx.config
            .as_ref()
            .and_then(|c| c.replay.store_dir.clone())
    });
    let storage: Arc<dyn CacheStorage> = match store_dir {
        Some(dir) => {
            let dir = ctx.resolve_path(&dir);
            ctx.output.debug(&format!("Using disk cache at {}", dir.display()));
            Arc::new(DiskCacheStorage::open_dir(&dir).await?)
        }
        None => Arc::new(MemoryCacheStorage::new()),
    };

    ctx.output.header(&format!("Replaying {} as {}", path.display(), worker.version));

    let report = run_script(script, worker, storage).await?;

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    print_report(&report, ctx);
    Ok(())
}

/// Run a script against `storage`.
pub async fn run_script(
    script: ReplayScript,
    worker: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
) -> Result<ReplayReport> {
    let started_at = Utc::now().to_rfc3339();
    let version = worker.version.to_string();

    let fetcher = Arc::new(FixtureFetcher::new());
    for (url, route) in &script.routes {
        fetcher.respond(url.clone(), route.to_stored());
    }

    let controller =
        OfflineController::new(WorkerContext::new(worker, storage.clone(), fetcher.clone()));
    let mut host = WorkerHost::new(controller);
    let mut steps: Vec<StepReport> = Vec::with_capacity(script.events.len());
    let mut pending: HashMap<EventId, usize> = HashMap::new();

    for (index, event) in script.events.into_iter().enumerate() {
        let step = index + 1;

        if !matches!(event, ScriptEvent::Fetch { .. }) {
            settle(&mut host, &mut pending, &mut steps).await;
        }

        let (label, result) = match event {
            ScriptEvent::Seed { store, urls } => {
                let cache = storage.open(&store).await?;
                for url in &urls {
                    let response = script
                        .routes
                        .get(url)
                        .map(RouteFixture::to_stored)
                        .unwrap_or_else(|| offline_fetch::ok_response(b"seeded"));
                    cache.put(CacheKey::get(url), response).await?;
                }
                (format!("seed {}", store), format!("{} entries", urls.len()))
            }
            ScriptEvent::Install => {
                let result = match host.install().await {
                    Ok(count) => format!("installed {} entries", count),
                    Err(e) => format!("install failed: {}", e),
                };
                ("install".to_string(), result)
            }
            ScriptEvent::Activate => {
                let result = match host.activate().await {
                    Ok(report) => format!(
                        "activated; pruned {:?}, failed {:?}, claimed {}{}",
                        report.pruned,
                        report.failed,
                        report.claimed,
                        if report.timed_out { " (prune timed out)" } else { "" }
                    ),
                    Err(e) => format!("activate failed: {}", e),
                };
                ("activate".to_string(), result)
            }
            ScriptEvent::Network { online } => {
                fetcher.set_online(online);
                let state = if online { "online" } else { "offline" };
                (format!("network {}", state), state.to_string())
            }
            ScriptEvent::Fail { url } => {
                fetcher.fail_url(url.clone());
                (format!("fail {}", url), "unreachable".to_string())
            }
            ScriptEvent::Fetch {
                url,
                method,
                mode,
                headers,
            } => {
                let request = build_request(&url, &method, mode.as_deref(), headers)
                    .with_context(|| format!("Invalid fetch at step {}", step))?;
                let label = format!("fetch {} {}", method.to_ascii_uppercase(), url);

                match host.fetch(request) {
                    Dispatch::Bypassed(_) => (label, "bypass".to_string()),
                    Dispatch::Pending(id) => {
                        pending.insert(id, steps.len());
                        (label, "pending".to_string())
                    }
                }
            }
        };

        debug!(step, event = %label, result = %result, "replay step");
        steps.push(StepReport {
            step,
            cache_status: (result == "bypass").then(|| "BYPASS".to_string()),
            event: label,
            result,
        });
    }

    settle(&mut host, &mut pending, &mut steps).await;

    let mut stores = BTreeMap::new();
    for name in storage.keys().await? {
        let keys = storage.open(&name).await?.keys().await?;
        stores.insert(name, keys.iter().map(ToString::to_string).collect());
    }

    Ok(ReplayReport {
        started_at,
        version,
        steps,
        stores,
        metrics: host.controller().metrics().snapshot(),
    })
}

async fn settle(
    host: &mut WorkerHost,
    pending: &mut HashMap<EventId, usize>,
    steps: &mut [StepReport],
) {
    for CompletedFetch { id, outcome, .. } in host.drain().await {
        let Some(index) = pending.remove(&id) else {
            continue;
        };
        let Some(step) = steps.get_mut(index) else {
            continue;
        };

        match outcome {
            FetchOutcome::Served { response, status } => {
                step.result = format!("HTTP {}", response.status());
                step.cache_status = Some(status.to_string());
            }
            FetchOutcome::Miss => step.result = "no response".to_string(),
            FetchOutcome::Failed(e) => step.result = format!("failed: {}", e),
        }
    }
}

fn build_request(
    url: &str,
    method: &str,
    mode: Option<&str>,
    headers: BTreeMap<String, String>,
) -> Result<RequestRecord> {
    let method = http::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("unknown method {:?}", method))?;

    let mut request = match mode {
        Some(name) => {
            let mode = RequestMode::parse(name).ok_or_else(|| anyhow!("unknown mode {:?}", name))?;
            let request = RequestRecord::new(method, url).with_mode(mode);
            if mode == RequestMode::Navigate && !headers.contains_key("accept") {
                request.with_header("accept", "text/html")
            } else {
                request
            }
        }
        None => RequestRecord::new(method, url),
    };

    for (name, value) in headers {
        request = request.with_header(name, value);
    }
    Ok(request)
}

fn print_report(report: &ReplayReport, ctx: &Context) {
    let width = report
        .steps
        .iter()
        .map(|s| s.event.len())
        .max()
        .unwrap_or(0);

    for step in &report.steps {
        let status = step
            .cache_status
            .as_deref()
            .map(cache_status_badge)
            .unwrap_or_default();
        ctx.output.info(&format!(
            "{:>3}. {:width$}  {} {}",
            step.step,
            step.event,
            step.result,
            status,
            width = width
        ));
    }

    ctx.output.header("Cache stores");
    if report.stores.is_empty() {
        ctx.output.info("(none)");
    }
    for (name, keys) in &report.stores {
        let marker = if *name == report.version { " (current)" } else { "" };
        ctx.output.info(&format!("{}{} - {} entries", name, marker, keys.len()));
        for key in keys {
            ctx.output.list_item(key);
        }
    }

    ctx.output.header("Metrics");
    for line in report.metrics.to_summary().lines() {
        ctx.output.info(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "worker": {
            "version": "v4",
            "manifest": ["/static/css/site.css", "/static/img/logo.svg"]
        },
        "routes": {
            "/static/css/site.css": { "body": "body{}" },
            "/static/img/logo.svg": { "body": "<svg/>" },
            "/api/price": { "body": "42" }
        },
        "events": [
            { "event": "seed", "store": "v2", "urls": ["/", "/static/css/site.css"] },
            { "event": "install" },
            { "event": "activate" },
            { "event": "fetch", "url": "/api/price" },
            { "event": "fetch", "method": "post", "url": "/cart" },
            { "event": "network", "online": false },
            { "event": "fetch", "url": "/checkout", "mode": "navigate" },
            { "event": "fetch", "url": "/api/price" },
            { "event": "fetch", "url": "/static/img/logo.svg" }
        ]
    }"#;

    async fn replay(script: &str) -> ReplayReport {
        let mut script: ReplayScript = serde_json::from_str(script).unwrap();
        let worker = script.worker.take().unwrap();
        run_script(script, worker, Arc::new(MemoryCacheStorage::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upgrade_and_offline_session() {
        let report = replay(SCRIPT).await;

        assert_eq!(report.steps[0].result, "2 entries");
        assert_eq!(report.steps[1].result, "installed 2 entries");
        assert!(report.steps[2].result.contains("pruned [\"v2\"]"));

        assert_eq!(report.steps[3].cache_status.as_deref(), Some("MISS"));
        assert_eq!(report.steps[4].result, "bypass");
        assert_eq!(report.steps[6].result, "no response");
        assert_eq!(report.steps[7].cache_status.as_deref(), Some("HIT"));
        assert_eq!(report.steps[8].cache_status.as_deref(), Some("HIT"));

        assert_eq!(report.stores.keys().collect::<Vec<_>>(), vec!["v4"]);
        assert_eq!(report.stores["v4"].len(), 3);
        assert_eq!(report.metrics.requests["bypass"], 1);
    }

    #[tokio::test]
    async fn test_failed_install_reported_not_fatal() {
        let report = replay(
            r#"{
                "worker": { "version": "v4", "manifest": ["/missing.css"] },
                "events": [ { "event": "install" }, { "event": "activate" } ]
            }"#,
        )
        .await;

        assert!(report.steps[0].result.starts_with("install failed"));
        assert!(report.steps[1].result.starts_with("activate failed"));
        assert!(report.stores.is_empty());
    }

    #[test]
    fn test_build_request() {
        let request = build_request("/", "get", Some("navigate"), BTreeMap::new()).unwrap();
        assert!(request.is_navigation());
        assert_eq!(request.accept(), Some("text/html"));

        assert!(build_request("/", "GET", Some("teleport"), BTreeMap::new()).is_err());
        assert!(build_request("/", "G E T", None, BTreeMap::new()).is_err());
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<ReplayScript, _> =
            serde_json::from_str(r#"{ "events": [ { "event": "reboot" } ] }"#);
        assert!(result.is_err());
    }
}
