//! Live manifest check against an origin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context as _, Result};
use offline_cache::{CacheStorage, MemoryCacheStorage};
use offline_core::RequestRecord;
use offline_fetch::{HttpFetcher, NetworkFetcher};
use offline_worker::{OfflineController, WorkerContext};
use serde::Serialize;

use super::CheckArgs;
use crate::context::Context;
use crate::output::format_bytes;

#[derive(Debug, Serialize)]
struct EntryReport {
    path: String,
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    elapsed_ms: u64,
}

impl EntryReport {
    fn ok(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    origin: String,
    version: String,
    entries: Vec<EntryReport>,
    installed: bool,
    cached: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    install_error: Option<String>,
}

/// Run the check command.
pub async fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let config = ctx.require_config()?;
    let origin = args
        .origin
        .or_else(|| config.worker.origin.clone())
        .ok_or_else(|| anyhow!("No origin configured. Set worker.origin or pass --origin."))?;

    let worker = config.worker.clone().with_origin(origin.clone());
    worker.validate()?;

    let fetcher = Arc::new(
        HttpFetcher::with_timeout(Duration::from_secs(args.timeout))?
            .with_base_url(&origin)
            .with_context(|| format!("Invalid origin {}", origin))?,
    );

    ctx.output.header(&format!(
        "Checking {} against {}",
        worker.version, origin
    ));

    // Probe each entry so a failed install can be explained.
    let progress = ctx.output.progress(worker.manifest.len() as u64, "fetching manifest");
    let mut entries = Vec::with_capacity(worker.manifest.len());
    for path in worker.manifest.iter() {
        let url = worker.install_url(path);
        progress.set_message(path.to_string());
        entries.push(probe(fetcher.as_ref(), path, &url).await);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let storage = Arc::new(MemoryCacheStorage::new());
    let version = worker.version.to_string();
    let controller = OfflineController::new(WorkerContext::new(worker, storage.clone(), fetcher));

    let spinner = ctx.output.spinner("installing");
    let install = controller.on_install().await;
    spinner.finish_and_clear();

    let cached = match storage.open(&version).await {
        Ok(store) if install.is_ok() => store.len().await.context("Failed to count cached entries")?,
        _ => 0,
    };

    let report = CheckReport {
        origin,
        version,
        installed: install.is_ok(),
        cached,
        install_error: install.as_ref().err().map(|e| format!("{:#}", e)),
        entries,
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
    } else {
        print_report(&report, ctx);
    }

    if let Err(e) = install {
        bail!(e);
    }
    Ok(())
}

async fn probe(fetcher: &dyn NetworkFetcher, path: &str, url: &str) -> EntryReport {
    let start = Instant::now();
    let result = fetcher.fetch(&RequestRecord::get(url)).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(mut response) => EntryReport {
            path: path.to_string(),
            url: url.to_string(),
            status: Some(response.status()),
            bytes: response.bytes().ok().map(|b| b.len() as u64),
            error: None,
            elapsed_ms,
        },
        Err(e) => EntryReport {
            path: path.to_string(),
            url: url.to_string(),
            status: None,
            bytes: None,
            error: Some(e.to_string()),
            elapsed_ms,
        },
    }
}

fn print_report(report: &CheckReport, ctx: &Context) {
    let width = report
        .entries
        .iter()
        .map(|e| e.path.len())
        .max()
        .unwrap_or(4)
        .max(4);

    ctx.output.info("");
    ctx.output
        .table_row(&["PATH", "STATUS", "SIZE", "TIME"], &[width, 6, 10, 8]);
    for entry in &report.entries {
        let status = entry
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "ERR".to_string());
        let size = entry.bytes.map(format_bytes).unwrap_or_default();
        let time = format!("{}ms", entry.elapsed_ms);
        ctx.output
            .table_row(&[entry.path.as_str(), &status, &size, &time], &[width, 6, 10, 8]);
    }

    for entry in report.entries.iter().filter(|e| !e.ok()) {
        match &entry.error {
            Some(error) => ctx.output.warn(&format!("{}: {}", entry.url, error)),
            None => ctx.output.warn(&format!(
                "{}: HTTP {}",
                entry.url,
                entry.status.unwrap_or_default()
            )),
        }
    }

    ctx.output.info("");
    if report.installed {
        ctx.output.success(&format!(
            "Install would succeed: {} entries cached in {}",
            report.cached, report.version
        ));
    } else {
        ctx.output.error(&format!(
            "Install would fail: {}",
            report.install_error.as_deref().unwrap_or("unknown error")
        ));
    }
}
