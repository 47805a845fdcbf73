//! Request handling classes.

use serde::{Deserialize, Serialize};

/// The handling class assigned to a request.
///
/// Every request gets exactly one class, decided before any asynchronous
/// work begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    /// Not a GET; left to the default network path.
    Bypass,
    /// Top-level document load.
    Navigation,
    /// Manifest-listed static asset.
    StaticAsset,
    /// Any other GET.
    GenericGet,
}

impl RequestClass {
    /// Check whether the controller intercepts this class.
    pub fn is_intercepted(&self) -> bool {
        !matches!(self, Self::Bypass)
    }
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bypass => write!(f, "bypass"),
            Self::Navigation => write!(f, "navigation"),
            Self::StaticAsset => write!(f, "static-asset"),
            Self::GenericGet => write!(f, "generic-get"),
        }
    }
}
