//! Offline CLI - Command line tool for the storefront offline cache controller.
//!
//! Commands:
//! - `offline config` - Manage configuration
//! - `offline check` - Install the manifest against a live origin
//! - `offline replay` - Run a scripted sequence of lifecycle and fetch events

mod commands;
mod config;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use offline_observability::{init_logging, LogFormat};

use commands::{CheckArgs, ConfigArgs, ReplayArgs};

/// Offline CLI - Inspect and exercise the storefront offline cache controller
#[derive(Parser)]
#[command(name = "offline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(ConfigArgs),

    /// Install the manifest against a live origin
    Check(CheckArgs),

    /// Replay a scripted sequence of worker events
    Replay(ReplayArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let logging = ctx.logging();
    let format = if cli.json { LogFormat::Json } else { logging.format };
    let level = if cli.verbose { "debug" } else { logging.level.as_str() };
    if let Err(e) = init_logging(format, level) {
        ctx.output.warn(&e.to_string());
    }

    // Execute command
    let result = match cli.command {
        Commands::Config(args) => commands::config::run(args, &ctx).await,
        Commands::Check(args) => commands::check::run(args, &ctx).await,
        Commands::Replay(args) => commands::replay::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
