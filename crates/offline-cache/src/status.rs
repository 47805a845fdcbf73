//! Cache status labels.

use serde::{Deserialize, Serialize};

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the current store without touching the network.
    Hit,
    /// Fetched from the network and written to the store.
    Miss,
    /// Fetched from the network and deliberately not stored.
    Network,
    /// Network failed; served a cached fallback.
    Fallback,
    /// Not intercepted.
    Bypass,
}

impl CacheStatus {
    /// Check whether the response came out of a cache store.
    pub fn from_cache(&self) -> bool {
        matches!(self, Self::Hit | Self::Fallback)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Network => write!(f, "NETWORK"),
            Self::Fallback => write!(f, "FALLBACK"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}
