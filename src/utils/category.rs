//! File category classification for watch mode.
//!
//! Decides what a changed path means for the rebuild controller.
//!
//! | Category | Rebuild Strategy                      | Example Files              |
//! |----------|---------------------------------------|----------------------------|
//! | Page     | Apply delta to page store, rebuild    | `content/**/*.html`        |
//! | Script   | Full rebuild (store untouched)        | `content/**/*.js`, `app/*` |
//! | Style    | Full rebuild (store untouched)        | `**/*.css`                 |
//! | Layout   | Full rebuild                          | `templates/**`             |
//! | Data     | Full rebuild                          | `content/_data/*.json`     |
//! | Image    | Copy to output, no rebuild            | `assets/**/*.png`          |
//! | Unknown  | Ignored                               | Files outside watched dirs |

use crate::config::SiteConfig;
use std::{
    env,
    path::{Path, PathBuf},
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts"];
const DATA_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Category of a changed file, used to pick the rebuild path in watch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Page source under the content root
    Page,
    /// Page script or application script
    Script,
    /// Stylesheet
    Style,
    /// Layout template
    Layout,
    /// Global data file
    Data,
    /// Static image, copied without a rebuild
    Image,
    /// Anything else
    Unknown,
}

impl FileCategory {
    /// Short name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Script => "script",
            Self::Style => "style",
            Self::Layout => "layout",
            Self::Data => "data",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a change in this category triggers a rebuild pass.
    pub const fn triggers_rebuild(self) -> bool {
        !matches!(self, Self::Image | Self::Unknown)
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

/// Categorize a file path to determine how changes should be handled.
pub fn categorize_path(path: &Path, config: &SiteConfig) -> FileCategory {
    let path = normalize_path(path);
    let ext = extension(&path);
    let build = &config.build;

    if path.starts_with(config.data_dir()) {
        return if DATA_EXTENSIONS.contains(&ext) {
            FileCategory::Data
        } else {
            FileCategory::Unknown
        };
    }

    if path.starts_with(&build.templates) {
        return FileCategory::Layout;
    }

    match ext {
        "html" if path.starts_with(&build.content) => FileCategory::Page,
        "css" => FileCategory::Style,
        e if SCRIPT_EXTENSIONS.contains(&e) && !path.starts_with(&build.cache) => {
            FileCategory::Script
        }
        e if IMAGE_EXTENSIONS.contains(&e) => FileCategory::Image,
        _ => FileCategory::Unknown,
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

    matches!(extension(path), "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Normalize a path to absolute form for reliable comparison.
///
/// Config paths are already canonicalized, so incoming watcher paths are
/// canonicalized too. Deleted files cannot be canonicalized; for those the
/// parent directory is canonicalized instead.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}
