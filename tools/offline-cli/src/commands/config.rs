//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};
use dialoguer::Confirm;
use offline_core::{NavigationRule, StaticMatching};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CliConfig};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force, version } => init_config(force, &version, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    let config = ctx.require_config()?;

    if ctx.output.is_json() {
        ctx.output.json(config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    if let Some(ref path) = ctx.config_path {
        ctx.output.kv("file", &path.display().to_string());
    }

    let worker = &config.worker;
    ctx.output.info("");
    ctx.output.info("[worker]");
    ctx.output.kv("version", worker.version.as_str());
    ctx.output.kv("navigation", navigation_name(worker.navigation));
    ctx.output.kv("static_matching", static_matching_name(worker.static_matching));
    ctx.output.kv("offline_root", worker.offline_root().unwrap_or("(disabled)"));
    if let Some(ref origin) = worker.origin {
        ctx.output.kv("origin", origin);
    }
    if !worker.vary_headers.is_empty() {
        ctx.output.kv("vary_headers", &worker.vary_headers.join(", "));
    }
    ctx.output.kv("prune_deadline_secs", &worker.prune_deadline_secs.to_string());

    ctx.output.info("");
    ctx.output.info(&format!("[worker.manifest] ({} entries)", worker.manifest.len()));
    for entry in worker.manifest.iter() {
        ctx.output.list_item(entry);
    }

    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("format", &config.logging.format.to_string());
    ctx.output.kv("level", &config.logging.level);

    if let Some(ref dir) = config.replay.store_dir {
        ctx.output.info("");
        ctx.output.info("[replay]");
        ctx.output.kv("store_dir", dir);
    }

    Ok(())
}

async fn init_config(force: bool, version: &str, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("offline.toml");

    if config_path.exists() && !force {
        if ctx.output.is_json() {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                config_path.display()
            );
        }

        let confirmed = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Config init cancelled");
            return Ok(());
        }
    }

    let content = generate_default_config(version);
    fs::write(&config_path, content)?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    // Surface the load error for a config that was found but skipped.
    if let (None, Some(path)) = (&ctx.config, &ctx.config_path) {
        CliConfig::load(path)?;
    }

    let config = ctx.require_config()?;
    let worker = &config.worker;
    let mut warnings: Vec<String> = Vec::new();

    if worker.manifest.is_empty() {
        warnings.push("worker.manifest is empty; nothing will be available offline".to_string());
    }

    if let Some(root) = worker.offline_root() {
        if !worker.manifest.entries().iter().any(|e| e == root) {
            warnings.push(format!(
                "worker.offline_root {:?} is not in the manifest; offline navigations may have no fallback",
                root
            ));
        }
    }

    if worker.static_matching == StaticMatching::None && !worker.manifest.is_empty() {
        warnings.push(
            "worker.static_matching is \"none\"; manifest assets are revalidated like any GET"
                .to_string(),
        );
    }

    if worker
        .vary_headers
        .iter()
        .any(|h| h.eq_ignore_ascii_case("cookie") || h.eq_ignore_ascii_case("authorization"))
    {
        warnings.push("worker.vary_headers includes credentials; cached entries will be per-user".to_string());
    }

    if worker.origin.is_none() {
        warnings.push("worker.origin is unset; `offline check` will need --origin".to_string());
    }

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

fn navigation_name(rule: NavigationRule) -> &'static str {
    match rule {
        NavigationRule::ModeOnly => "mode-only",
        NavigationRule::ModeOrAccept => "mode-or-accept",
    }
}

fn static_matching_name(matching: StaticMatching) -> &'static str {
    match matching {
        StaticMatching::Manifest => "manifest",
        StaticMatching::None => "none",
    }
}
