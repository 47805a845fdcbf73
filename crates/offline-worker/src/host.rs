//! Event dispatch.

use std::sync::Arc;

use offline_core::{RequestClass, RequestRecord};
use tokio::task::JoinSet;
use tracing::warn;

use crate::controller::{Interception, OfflineController};
use crate::lifecycle::{ActivationReport, LifecycleError};
use crate::strategy::FetchOutcome;

/// Sequence number of a dispatched fetch, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub u64);

/// How a fetch was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not intercepted.
    Bypassed(EventId),
    /// Intercepted; the outcome arrives through `next_completed` or `drain`.
    Pending(EventId),
}

impl Dispatch {
    /// The event's sequence number.
    pub fn id(&self) -> EventId {
        match self {
            Self::Bypassed(id) | Self::Pending(id) => *id,
        }
    }
}

/// A settled fetch.
#[derive(Debug)]
pub struct CompletedFetch {
    /// Sequence number assigned at dispatch.
    pub id: EventId,
    /// The request URL.
    pub url: String,
    /// The class assigned at dispatch.
    pub class: RequestClass,
    /// What the strategy produced.
    pub outcome: FetchOutcome,
}

/// Runs a controller's hooks on the tokio runtime.
///
/// Fetches are classified in arrival order and their strategies spawned;
/// each spawned task is tracked until it settles, in whatever order the
/// tasks finish. Lifecycle hooks run to completion before returning.
pub struct WorkerHost {
    controller: Arc<OfflineController>,
    in_flight: JoinSet<CompletedFetch>,
    next_id: u64,
}

impl WorkerHost {
    /// Host a controller.
    pub fn new(controller: OfflineController) -> Self {
        Self {
            controller: Arc::new(controller),
            in_flight: JoinSet::new(),
            next_id: 0,
        }
    }

    /// The hosted controller.
    pub fn controller(&self) -> &Arc<OfflineController> {
        &self.controller
    }

    /// Deliver the install event.
    pub async fn install(&self) -> Result<usize, LifecycleError> {
        self.controller.on_install().await
    }

    /// Deliver the activate event.
    pub async fn activate(&self) -> Result<ActivationReport, LifecycleError> {
        self.controller.on_activate().await
    }

    /// Deliver a fetch event.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch(&mut self, request: RequestRecord) -> Dispatch {
        self.next_id += 1;
        let id = EventId(self.next_id);
        let url = request.url().to_string();

        match self.controller.on_fetch(request) {
            Interception::Bypass => Dispatch::Bypassed(id),
            Interception::Respond { class, outcome } => {
                self.in_flight.spawn(async move {
                    CompletedFetch {
                        id,
                        url,
                        class,
                        outcome: outcome.await,
                    }
                });
                Dispatch::Pending(id)
            }
        }
    }

    /// Number of fetches not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait for the next fetch to settle.
    ///
    /// Returns `None` once nothing is in flight.
    pub async fn next_completed(&mut self) -> Option<CompletedFetch> {
        while let Some(joined) = self.in_flight.join_next().await {
            match joined {
                Ok(completed) => return Some(completed),
                Err(e) => warn!(error = %e, "fetch task did not complete"),
            }
        }
        None
    }

    /// Wait for every in-flight fetch, in completion order.
    pub async fn drain(&mut self) -> Vec<CompletedFetch> {
        let mut completed = Vec::with_capacity(self.in_flight.len());
        while let Some(fetch) = self.next_completed().await {
            completed.push(fetch);
        }
        completed
    }
}
