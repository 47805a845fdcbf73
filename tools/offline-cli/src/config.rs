//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use offline_core::WorkerConfig;
use offline_observability::LogFormat;
use serde::{Deserialize, Serialize};

/// File names searched for, in order, from the working directory upward.
pub const CONFIG_NAMES: [&str; 3] = ["offline.toml", ".offline.toml", "offline.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Worker deployment configuration.
    pub worker: WorkerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Replay defaults.
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl CliConfig {
    /// Load and validate config from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?
        };

        config
            .worker
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format (default: human).
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> LogFormat {
    LogFormat::Human
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

/// Replay defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Directory for the on-disk cache backend. Memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<String>,
}

/// Generate a default offline.toml config file.
pub fn generate_default_config(version: &str) -> String {
    format!(
        r#"# Storefront offline cache configuration

[worker]
# Cache generation name; bump on every deployment that changes cached assets.
version = "{version}"
manifest = [
    "/",
    "/static/css/site.css",
    "/static/js/app.js",
    "/static/img/logo.svg",
]
# "mode-only" or "mode-or-accept"
navigation = "mode-or-accept"
# "manifest" or "none"
static_matching = "manifest"
offline_root = "/"
# origin = "https://shop.example.com"
# vary_headers = ["accept-language"]
prune_deadline_secs = 30

[logging]
format = "human"
level = "warn"

[replay]
# store_dir = ".offline/cache"
"#,
        version = version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: CliConfig = toml::from_str(&generate_default_config("gearloom-pwa-v1")).unwrap();
        assert_eq!(config.worker.version.as_str(), "gearloom-pwa-v1");
        assert_eq!(config.worker.manifest.len(), 4);
        assert_eq!(config.logging.format, LogFormat::Human);
        assert!(config.replay.store_dir.is_none());
        config.worker.validate().unwrap();
    }

    #[test]
    fn test_load_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("offline.toml");
        std::fs::write(&toml_path, generate_default_config("v4")).unwrap();
        assert_eq!(CliConfig::load(&toml_path).unwrap().worker.version.as_str(), "v4");

        let json_path = dir.path().join("offline.json");
        std::fs::write(
            &json_path,
            r#"{"worker": {"version": "v5", "manifest": ["/"]}, "logging": {"format": "json"}}"#,
        )
        .unwrap();
        let config = CliConfig::load(&json_path).unwrap();
        assert_eq!(config.worker.version.as_str(), "v5");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_rejects_invalid_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.toml");
        std::fs::write(
            &path,
            "[worker]\nversion = \"v4\"\noffline_root = \"index.html\"\n",
        )
        .unwrap();

        let err = CliConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("offline_root"));
    }
}
