//! `[build]` section configuration.
//!
//! Paths for every input and output directory, layout defaults, and the
//! bundler command.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in kiln.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"      # Page sources (*.html with front matter)
/// output = "public"        # Output directory
/// minify = true            # Minify rendered HTML
///
/// [build.bundle]
/// command = ["npx", "esbuild"]
/// entry = "app/main.js"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Page source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Layout template directory.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Static assets, copied verbatim to `<output>/assets`.
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// Snippet content source directory (`<key>.html`).
    #[serde(default = "defaults::build::snippets")]
    #[educe(Default = defaults::build::snippets())]
    pub snippets: PathBuf,

    /// Global data directory name, relative to `content`.
    #[serde(default = "defaults::build::data")]
    #[educe(Default = defaults::build::data())]
    pub data: PathBuf,

    /// Staging directory for wrapped page scripts.
    #[serde(default = "defaults::build::cache")]
    #[educe(Default = defaults::build::cache())]
    pub cache: PathBuf,

    /// Favicon copied to `<output>/favicon.ico`.
    #[serde(default = "defaults::build::favicon")]
    #[educe(Default = defaults::build::favicon())]
    pub favicon: PathBuf,

    /// Layout used when a page's front matter has no `layout`.
    #[serde(default = "defaults::build::default_layout")]
    #[educe(Default = defaults::build::default_layout())]
    pub default_layout: String,

    /// Minify rendered HTML.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,

    /// Client bundle settings.
    #[serde(default)]
    pub bundle: BundleConfig,
}

/// `[build.bundle]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    /// Bundler command and leading arguments.
    #[serde(default = "defaults::build::bundle::command")]
    #[educe(Default = defaults::build::bundle::command())]
    pub command: Vec<String>,

    /// Main application entry, relative to root.
    #[serde(default = "defaults::build::bundle::entry")]
    #[educe(Default = defaults::build::bundle::entry())]
    pub entry: PathBuf,

    /// Pass `--minify` to the bundler.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.content, PathBuf::from("content"));
        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.templates, PathBuf::from("templates"));
        assert_eq!(config.build.data, PathBuf::from("_data"));
        assert_eq!(config.build.default_layout, "default");
        assert!(!config.build.minify);
        assert!(!config.build.clean);
        assert_eq!(config.build.bundle.command, vec!["esbuild".to_owned()]);
        assert_eq!(config.build.bundle.entry, PathBuf::from("app/main.js"));
    }

    #[test]
    fn test_build_config_custom() {
        let config: SiteConfig = toml::from_str(
            r#"
            [build]
            content = "pages"
            output = "dist"
            default_layout = "base"
            minify = true

            [build.bundle]
            command = ["npx", "esbuild"]
            entry = "src/app.js"
            minify = true
        "#,
        )
        .unwrap();

        assert_eq!(config.build.content, PathBuf::from("pages"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.default_layout, "base");
        assert!(config.build.minify);
        assert_eq!(config.build.bundle.command, vec!["npx", "esbuild"]);
        assert_eq!(config.build.bundle.entry, PathBuf::from("src/app.js"));
        assert!(config.build.bundle.minify);
    }

    #[test]
    fn test_build_unknown_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str(
            r#"
            [build]
            tailwind = true
        "#,
        );
        assert!(result.is_err());
    }
}
