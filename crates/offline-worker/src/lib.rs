//! Offline cache controller.
//!
//! This crate ties the cache, network and configuration crates together:
//! - `Classifier` - Assigns every request exactly one handling class
//! - `StrategyExecutor` - Network-first, cache-first and cache-then-refill strategies
//! - `LifecycleController` - Atomic install and stale-store pruning on activate
//! - `ClientRegistry` / `ClientSet` - Open clients claimed on activation
//! - `OfflineController` - The install, activate and fetch hooks
//! - `WorkerHost` - Dispatches events and keeps their work alive until settled
//!
//! # Example
//!
//! ```ignore
//! use offline_worker::{Interception, OfflineController, WorkerContext};
//!
//! let controller = OfflineController::new(WorkerContext::new(config, storage, fetcher));
//! controller.on_install().await?;
//! controller.on_activate().await?;
//!
//! if let Interception::Respond { outcome, .. } = controller.on_fetch(request) {
//!     let outcome = outcome.await;
//! }
//! ```

mod classify;
mod clients;
mod context;
mod controller;
mod host;
mod lifecycle;
mod strategy;

pub use classify::*;
pub use clients::*;
pub use context::*;
pub use controller::*;
pub use host::*;
pub use lifecycle::*;
pub use strategy::*;
