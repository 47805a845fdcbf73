//! Static asset manifest.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::request::url_path;

/// Error for a malformed manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("manifest entry {entry:?} must be an absolute path starting with '/', with no query or fragment")]
pub struct InvalidManifestEntry {
    /// The offending entry.
    pub entry: String,
}

/// Ordered list of paths that must always be available offline.
///
/// Entries ending in `/` are directory entries and match every path below
/// them; all other entries match their exact path. Lookups never scan the
/// list: exact entries live in a hash set and directory entries are found by
/// walking the request path's ancestors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StaticAssetManifest {
    entries: Vec<String>,
    #[serde(skip)]
    exact: HashSet<String>,
    #[serde(skip)]
    directories: HashSet<String>,
}

impl StaticAssetManifest {
    /// Build a manifest, keeping first occurrences of duplicate entries.
    pub fn new<I, S>(entries: I) -> Result<Self, InvalidManifestEntry>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut manifest = Self::default();

        for entry in entries {
            let entry = entry.into();
            if !entry.starts_with('/') || entry.contains(['?', '#']) {
                return Err(InvalidManifestEntry { entry });
            }

            let fresh = if entry.ends_with('/') && entry.len() > 1 {
                manifest.directories.insert(entry.clone())
            } else {
                manifest.exact.insert(entry.clone())
            };

            if fresh {
                manifest.entries.push(entry);
            }
        }

        Ok(manifest)
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether a request URL refers to a manifest asset.
    ///
    /// The URL is reduced to its path first, so absolute URLs and cache-busting
    /// query strings still match.
    pub fn matches(&self, url: &str) -> bool {
        let path = url_path(url);

        if self.exact.contains(path) {
            return true;
        }

        if self.directories.is_empty() {
            return false;
        }

        path.match_indices('/')
            .map(|(i, _)| &path[..=i])
            .any(|ancestor| self.directories.contains(ancestor))
    }

    /// Iterate over entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for StaticAssetManifest {
    type Error = InvalidManifestEntry;

    fn try_from(entries: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<StaticAssetManifest> for Vec<String> {
    fn from(manifest: StaticAssetManifest) -> Self {
        manifest.entries
    }
}
