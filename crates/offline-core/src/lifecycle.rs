//! Worker lifecycle tracking.

use serde::{Deserialize, Serialize};

/// Lifecycle phases of one deployed worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    /// Constructed, no lifecycle event seen yet.
    #[default]
    Parsed,
    /// Manifest prefetch in progress.
    Installing,
    /// Manifest committed; eligible to activate.
    Installed,
    /// Pruning stale stores and claiming clients.
    Activating,
    /// Controlling clients and handling fetches.
    Activated,
    /// Install failed or the version was superseded.
    Redundant,
}

impl WorkerPhase {
    /// Check whether a transition to `next` is allowed.
    pub fn can_transition_to(&self, next: WorkerPhase) -> bool {
        use WorkerPhase::*;

        matches!(
            (self, next),
            (Parsed, Installing)
                | (Redundant, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Installed, Redundant)
                | (Activated, Redundant)
        )
    }

    /// Check whether the worker controls clients in this phase.
    pub fn controls_clients(&self) -> bool {
        matches!(self, Self::Activated)
    }

    /// Check whether install has committed in this phase.
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed | Self::Activating | Self::Activated)
    }
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Observer for lifecycle transitions.
pub trait LifecycleObserver: Send + Sync {
    /// Called after the phase changes.
    fn on_phase(&self, version: &str, phase: WorkerPhase);
}
