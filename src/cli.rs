//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kiln static site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content directory path (relative to project root)
    #[arg(short, long)]
    pub content: Option<PathBuf>,

    /// Config file name (default: kiln.toml)
    #[arg(short = 'C', long, default_value = "kiln.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Watch commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Minify the html content
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site once
    Build {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Write the build manifest (pages and snippet keys) as JSON
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Build, then rebuild incrementally on file changes
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_with_manifest() {
        let cli = Cli::parse_from(["kiln", "build", "--clean", "--manifest", "out.json"]);
        match &cli.command {
            Commands::Build {
                build_args,
                manifest,
            } => {
                assert!(build_args.clean);
                assert_eq!(*manifest, Some(PathBuf::from("out.json")));
            }
            Commands::Watch { .. } => panic!("expected build"),
        }
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
    }

    #[test]
    fn test_parse_watch_with_minify_flag() {
        let cli = Cli::parse_from(["kiln", "--root", "site", "watch", "--minify"]);
        assert_eq!(cli.root, Some(PathBuf::from("site")));
        match &cli.command {
            Commands::Watch { build_args } => assert_eq!(build_args.minify, Some(true)),
            Commands::Build { .. } => panic!("expected watch"),
        }
    }

    #[test]
    fn test_default_config_name() {
        let cli = Cli::parse_from(["kiln", "build"]);
        assert_eq!(cli.config, PathBuf::from("kiln.toml"));
    }
}
