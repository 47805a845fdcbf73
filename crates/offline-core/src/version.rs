//! Cache generation naming.

use serde::{Deserialize, Serialize};

/// Name of the current cache generation.
///
/// Bumped once per deployment. The tag doubles as the name of the only
/// cache store the deployment reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    /// Create a version tag, rejecting blank names.
    pub fn new(tag: impl Into<String>) -> Result<Self, InvalidVersionTag> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(InvalidVersionTag);
        }
        Ok(Self(tag))
    }

    /// Get the tag string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a cache store name belongs to this generation.
    pub fn owns(&self, store_name: &str) -> bool {
        self.0 == store_name
    }
}

/// Error returned for a blank version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("version tag must not be empty")]
pub struct InvalidVersionTag;

impl TryFrom<String> for VersionTag {
    type Error = InvalidVersionTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VersionTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
