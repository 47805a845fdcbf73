//! Deployment-fixed worker configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::manifest::StaticAssetManifest;
use crate::version::VersionTag;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Failed to parse JSON.
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How navigation requests are detected.
///
/// Chosen once per deployment; the two rules are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationRule {
    /// Only the request's navigate mode counts.
    ModeOnly,
    /// Navigate mode, or an `accept` header asking for HTML.
    #[default]
    ModeOrAccept,
}

/// Whether static assets are recognised at fetch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaticMatching {
    /// Requests matching the manifest use the static-asset strategy.
    #[default]
    Manifest,
    /// No fetch-time manifest check; requests are navigation or generic.
    None,
}

/// Worker configuration.
///
/// The version tag and manifest are the deployment's identity; the remaining
/// fields are policy knobs fixed for the lifetime of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the current cache generation.
    pub version: VersionTag,

    /// Paths prefetched at install.
    #[serde(default)]
    pub manifest: StaticAssetManifest,

    /// Navigation detection rule.
    #[serde(default)]
    pub navigation: NavigationRule,

    /// Fetch-time static asset recognition.
    #[serde(default)]
    pub static_matching: StaticMatching,

    /// Cached document served when an offline navigation has no exact match.
    /// Empty disables the root fallback.
    #[serde(default = "default_offline_root")]
    pub offline_root: String,

    /// Origin prefixed to manifest paths when building install requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Request headers folded into cache keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vary_headers: Vec<String>,

    /// Upper bound on stale-store pruning during activation.
    #[serde(default = "default_prune_deadline_secs")]
    pub prune_deadline_secs: u64,
}

fn default_offline_root() -> String {
    "/".to_string()
}

fn default_prune_deadline_secs() -> u64 {
    30
}

impl WorkerConfig {
    /// Create a configuration with default policies.
    pub fn new(version: VersionTag, manifest: StaticAssetManifest) -> Self {
        Self {
            version,
            manifest,
            navigation: NavigationRule::default(),
            static_matching: StaticMatching::default(),
            offline_root: default_offline_root(),
            origin: None,
            vary_headers: Vec::new(),
            prune_deadline_secs: default_prune_deadline_secs(),
        }
    }

    /// Set the navigation rule.
    pub fn with_navigation(mut self, rule: NavigationRule) -> Self {
        self.navigation = rule;
        self
    }

    /// Set static asset recognition.
    pub fn with_static_matching(mut self, matching: StaticMatching) -> Self {
        self.static_matching = matching;
        self
    }

    /// Set the offline root document.
    pub fn with_offline_root(mut self, root: impl Into<String>) -> Self {
        self.offline_root = root.into();
        self
    }

    /// Set the origin used for install requests.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add a header to the cache key.
    pub fn vary_on(mut self, header: impl Into<String>) -> Self {
        self.vary_headers.push(header.into());
        self
    }

    /// Set the prune deadline.
    pub fn with_prune_deadline(mut self, deadline: Duration) -> Self {
        self.prune_deadline_secs = deadline.as_secs();
        self
    }

    /// The offline root, if enabled.
    pub fn offline_root(&self) -> Option<&str> {
        if self.offline_root.is_empty() {
            None
        } else {
            Some(&self.offline_root)
        }
    }

    /// The prune deadline.
    pub fn prune_deadline(&self) -> Duration {
        Duration::from_secs(self.prune_deadline_secs)
    }

    /// Resolve a manifest path to the URL fetched at install.
    pub fn install_url(&self, path: &str) -> String {
        match &self.origin {
            Some(origin) => format!("{}{}", origin.trim_end_matches('/'), path),
            None => path.to_string(),
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(root) = self.offline_root() {
            if !root.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "offline_root {:?} must start with '/'",
                    root
                )));
            }
        }

        if let Some(origin) = &self.origin {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "origin {:?} must be an http(s) URL",
                    origin
                )));
            }
        }

        if self.vary_headers.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "vary_headers must not contain empty names".to_string(),
            ));
        }

        if self.prune_deadline_secs == 0 {
            return Err(ConfigError::Invalid(
                "prune_deadline_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse TOML and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON and validate.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }
}
