//! Logging and metrics for the offline cache controller.
//!
//! This crate provides:
//! - `init_logging` - Global tracing subscriber in JSON or human format
//! - `StrategyMetrics` - Counters per request class, cache status and lifecycle event

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;
