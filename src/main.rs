//! kiln - pre-renders html pages and bundles them into a client-side router.

mod build;
mod cli;
mod compiler;
mod config;
mod data;
mod error;
mod hooks;
mod logger;
mod page;
mod snippet;
mod utils;
mod watch;

use anyhow::{Context, Result};
use build::BuildSession;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use hooks::{HookArgs, HookPoint};
use std::{fs, path::PathBuf};
use watch::watch_for_changes_blocking;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Build { manifest, .. } => build_once(config, manifest.clone()),
        Commands::Watch { .. } => {
            let mut session = BuildSession::with_defaults(config)?;
            // Initial failures are reported but do not stop the watcher
            if let Err(e) = session.discover().and_then(|_| session.build()) {
                log!("error"; "{e:#}");
            }
            watch_for_changes_blocking(session)
        }
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let config = SiteConfig::load(cli)?;
    if !config.config_path.exists() {
        log!("config"; "{} not found, using defaults", config.config_path.display());
    }
    config.validate()?;
    Ok(config)
}

/// One-shot build, writing the manifest as JSON when asked to.
fn build_once(config: SiteConfig, manifest_path: Option<PathBuf>) -> Result<()> {
    let mut session = BuildSession::with_defaults(config)?;

    if let Some(path) = manifest_path {
        session.hooks_mut().register(HookPoint::AfterBuild, move |args| {
            if let HookArgs::AfterBuild(manifest) = args {
                let json = serde_json::to_string_pretty(manifest)?;
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write manifest {}", path.display()))?;
            }
            Ok(())
        });
    }

    session.discover()?;
    session.build()?;
    Ok(())
}
