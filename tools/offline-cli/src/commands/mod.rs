//! CLI command implementations.

pub mod check;
pub mod config;
pub mod replay;

use clap::{Args, Subcommand};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,

        /// Version tag for the first cache generation.
        #[arg(long, default_value = "gearloom-pwa-v1")]
        version: String,
    },
    /// Validate the config file.
    Validate,
}

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Origin to fetch manifest entries from (default: worker.origin).
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

/// Arguments for the replay command.
#[derive(Args)]
pub struct ReplayArgs {
    /// Path to the replay script (JSON).
    pub script: String,

    /// Persist cache stores under this directory instead of in memory.
    #[arg(long)]
    pub store_dir: Option<String>,
}
