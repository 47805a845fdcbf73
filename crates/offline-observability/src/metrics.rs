//! Strategy and lifecycle counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use offline_cache::CacheStatus;
use offline_core::{LifecycleObserver, RequestClass, WorkerPhase};
use serde::{Deserialize, Serialize};

const CLASSES: [RequestClass; 4] = [
    RequestClass::Bypass,
    RequestClass::Navigation,
    RequestClass::StaticAsset,
    RequestClass::GenericGet,
];

const STATUSES: [CacheStatus; 5] = [
    CacheStatus::Hit,
    CacheStatus::Miss,
    CacheStatus::Network,
    CacheStatus::Fallback,
    CacheStatus::Bypass,
];

fn class_index(class: RequestClass) -> usize {
    match class {
        RequestClass::Bypass => 0,
        RequestClass::Navigation => 1,
        RequestClass::StaticAsset => 2,
        RequestClass::GenericGet => 3,
    }
}

fn status_index(status: CacheStatus) -> usize {
    match status {
        CacheStatus::Hit => 0,
        CacheStatus::Miss => 1,
        CacheStatus::Network => 2,
        CacheStatus::Fallback => 3,
        CacheStatus::Bypass => 4,
    }
}

/// Process-wide counters for one controller.
///
/// All counters are relaxed atomics; a snapshot is a consistent view of each
/// counter, not of the set.
#[derive(Debug, Default)]
pub struct StrategyMetrics {
    classes: [AtomicU64; 4],
    statuses: [AtomicU64; 5],
    unanswered: AtomicU64,
    failures: AtomicU64,
    fetch_micros: AtomicU64,
    installs: AtomicU64,
    redundant: AtomicU64,
    activations: AtomicU64,
    stores_pruned: AtomicU64,
    prune_failures: AtomicU64,
}

impl StrategyMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a classified request.
    pub fn record_class(&self, class: RequestClass) {
        self.classes[class_index(class)].fetch_add(1, Ordering::Relaxed);
    }

    /// Count a strategy that produced a response.
    pub fn record_served(&self, status: CacheStatus, elapsed: Duration) {
        self.statuses[status_index(status)].fetch_add(1, Ordering::Relaxed);
        self.add_elapsed(elapsed);
    }

    /// Count a request left to the network untouched.
    pub fn record_bypass(&self) {
        self.statuses[status_index(CacheStatus::Bypass)].fetch_add(1, Ordering::Relaxed);
    }

    /// Count a strategy that finished without a response.
    pub fn record_unanswered(&self, elapsed: Duration) {
        self.unanswered.fetch_add(1, Ordering::Relaxed);
        self.add_elapsed(elapsed);
    }

    /// Count a strategy that failed with a network error.
    pub fn record_failure(&self, elapsed: Duration) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.add_elapsed(elapsed);
    }

    /// Count the outcome of stale-store pruning.
    pub fn record_prune(&self, pruned: usize, failed: usize) {
        self.stores_pruned.fetch_add(pruned as u64, Ordering::Relaxed);
        self.prune_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    fn add_elapsed(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.fetch_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Requests seen for one class.
    pub fn class_count(&self, class: RequestClass) -> u64 {
        self.classes[class_index(class)].load(Ordering::Relaxed)
    }

    /// Responses produced with one status.
    pub fn status_count(&self, status: CacheStatus) -> u64 {
        self.statuses[status_index(status)].load(Ordering::Relaxed)
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests: CLASSES
                .iter()
                .map(|class| (class.to_string(), self.class_count(*class)))
                .collect(),
            responses: STATUSES
                .iter()
                .map(|status| (status.to_string().to_lowercase(), self.status_count(*status)))
                .collect(),
            unanswered: load(&self.unanswered),
            failures: load(&self.failures),
            fetch_time_us: load(&self.fetch_micros),
            installs: load(&self.installs),
            redundant: load(&self.redundant),
            activations: load(&self.activations),
            stores_pruned: load(&self.stores_pruned),
            prune_failures: load(&self.prune_failures),
        }
    }
}

impl LifecycleObserver for StrategyMetrics {
    fn on_phase(&self, _version: &str, phase: WorkerPhase) {
        let counter = match phase {
            WorkerPhase::Installed => &self.installs,
            WorkerPhase::Redundant => &self.redundant,
            WorkerPhase::Activated => &self.activations,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`StrategyMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Requests by class.
    pub requests: BTreeMap<String, u64>,
    /// Responses by cache status.
    pub responses: BTreeMap<String, u64>,
    /// Strategies that ended with no response.
    pub unanswered: u64,
    /// Strategies that ended with a network error.
    pub failures: u64,
    /// Total time spent in strategies (microseconds).
    pub fetch_time_us: u64,
    /// Successful installs.
    pub installs: u64,
    /// Versions that became redundant.
    pub redundant: u64,
    /// Completed activations.
    pub activations: u64,
    /// Stale stores deleted.
    pub stores_pruned: u64,
    /// Stale stores that could not be deleted.
    pub prune_failures: u64,
}

impl MetricsSnapshot {
    /// Total intercepted requests.
    pub fn intercepted(&self) -> u64 {
        self.requests
            .iter()
            .filter(|(class, _)| class.as_str() != "bypass")
            .map(|(_, count)| count)
            .sum()
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Requests intercepted: {}", self.intercepted()));
        for (class, count) in &self.requests {
            lines.push(format!("  {}: {}", class, count));
        }

        lines.push("Responses:".to_string());
        for (status, count) in &self.responses {
            lines.push(format!("  {}: {}", status, count));
        }
        if self.unanswered > 0 {
            lines.push(format!("  unanswered: {}", self.unanswered));
        }
        if self.failures > 0 {
            lines.push(format!("  failed: {}", self.failures));
        }

        lines.push(format!(
            "Lifecycle: {} installed, {} activated, {} redundant",
            self.installs, self.activations, self.redundant
        ));

        if self.stores_pruned > 0 || self.prune_failures > 0 {
            lines.push(format!(
                "Pruning: {} deleted, {} failed",
                self.stores_pruned, self.prune_failures
            ));
        }

        lines.join("\n")
    }
}
