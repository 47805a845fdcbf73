//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};

use crate::config::{CliConfig, LoggingConfig, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration, when a config file was found.
    pub config: Option<CliConfig>,
    /// Where the configuration came from.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    ///
    /// An explicit path must load; a discovered file that fails to load is
    /// reported and skipped.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            let path = resolve(&cwd, path);
            (Some(CliConfig::load(&path)?), Some(path))
        } else {
            match find_config(&cwd) {
                Some(path) => match CliConfig::load(&path) {
                    Ok(config) => (Some(config), Some(path)),
                    Err(e) => {
                        output.warn(&format!("Ignoring {}: {:#}", path.display(), e));
                        (None, Some(path))
                    }
                },
                None => (None, None),
            }
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// The loaded configuration, or an error telling the user how to create one.
    pub fn require_config(&self) -> Result<&CliConfig> {
        match (&self.config, &self.config_path) {
            (Some(config), _) => Ok(config),
            (None, Some(path)) => Err(anyhow!("Config file {} could not be loaded", path.display())),
            (None, None) => Err(anyhow!(
                "No config file found. Run `offline config init` to create one."
            )),
        }
    }

    /// Logging settings, defaulted when no config is loaded.
    pub fn logging(&self) -> LoggingConfig {
        self.config
            .as_ref()
            .map(|c| c.logging.clone())
            .unwrap_or_default()
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve(&self.cwd, path)
    }
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        cwd.join(path)
    }
}

/// Find a config file in the directory tree.
fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        for name in &CONFIG_NAMES {
            let config_path = current.join(name);
            if config_path.exists() {
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    None
}
