//! Site configuration management for `kiln.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                            |
//! |------------|----------------------------------------------------|
//! | `[site]`   | Default title/description, title suffix, language  |
//! | `[build]`  | Paths, layouts, minification, bundler              |
//! | `[watch]`  | Watch mode and debounce window                     |
//! | `[extra]`  | User-defined fields, exposed to templates          |
//! | `[[hooks]]`| Commands run at build lifecycle points             |
//!
//! # Example
//!
//! ```toml
//! [site]
//! title = "Acme"
//! title_suffix = " | Acme"
//!
//! [build]
//! content = "content"
//! output = "public"
//!
//! [watch]
//! debounce_ms = 100
//!
//! [extra]
//! analytics_id = "UA-12345"
//! ```

mod build;
pub mod defaults;
mod error;
mod hooks;
mod site;
mod watch;

pub use build::BuildConfig;
pub use error::ConfigError;
pub use hooks::HookConfig;
pub use site::SiteSection;
pub use watch::WatchConfig;

use crate::cli::{Cli, Commands};
use crate::hooks::HookPoint;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing kiln.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site metadata shared by every page
    #[serde(default)]
    pub site: SiteSection,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: BTreeMap<String, toml::Value>,

    /// Command hooks, in run order per point
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load from the CLI-selected root, falling back to defaults when the
    /// config file is absent.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf());
    }

    /// Absolute global-data directory inside the content root.
    pub fn data_dir(&self) -> PathBuf {
        self.build.content.join(&self.build.data)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        Self::update_option(&mut self.build.content, cli.content.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        let build_args = match &cli.command {
            Commands::Build { build_args, .. } | Commands::Watch { build_args } => build_args,
        };
        if build_args.clean {
            self.build.clean = true;
        }
        Self::update_option(&mut self.build.minify, build_args.minify.as_ref());

        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());
        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.resolve_paths(&root);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make every configured path absolute, relative to `root`.
    pub fn resolve_paths(&mut self, root: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        let build = &mut self.build;
        build.content = Self::normalize_path(&root.join(&build.content));
        build.output = Self::normalize_path(&root.join(&build.output));
        build.templates = Self::normalize_path(&root.join(&build.templates));
        build.assets = Self::normalize_path(&root.join(&build.assets));
        build.snippets = Self::normalize_path(&root.join(&build.snippets));
        build.cache = Self::normalize_path(&root.join(&build.cache));
        build.favicon = Self::normalize_path(&root.join(&build.favicon));
        build.bundle.entry = Self::normalize_path(&root.join(&build.bundle.entry));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
            }
        })
    }

    /// Validate configuration before the first build.
    pub fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("content", &self.build.content),
            ("templates", &self.build.templates),
        ] {
            if !path.is_dir() {
                bail!(ConfigError::MissingDir { field, path: path.clone() });
            }
        }

        if self.build.default_layout.trim().is_empty() {
            bail!(ConfigError::Validation(
                "[build.default_layout] must not be empty".into()
            ));
        }

        if self.build.bundle.entry.exists() {
            Self::check_command_installed("[build.bundle.command]", &self.build.bundle.command)?;
        }

        for hook in &self.hooks {
            hook.point
                .parse::<HookPoint>()
                .map_err(|e| ConfigError::Validation(format!("[[hooks]] {e}")))?;
            if hook.command.is_empty() {
                bail!(ConfigError::Validation(format!(
                    "[[hooks]] command for `{}` must have at least one element",
                    hook.point
                )));
            }
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd).with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}
