//! Static assets, favicon and images changed in watch mode.
//!
//! | Source                         | Output                        |
//! |--------------------------------|-------------------------------|
//! | `<assets>/<rel>`               | `<output>/assets/<rel>`       |
//! | `<favicon>`                    | `<output>/favicon.ico`        |
//! | `<content>/<rel>` (images)     | `<output>/<rel>`              |

use crate::compiler::{WriteStats, collect_all_files};
use crate::config::SiteConfig;
use crate::log;
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Output directory name for `[build.assets]`.
pub const ASSETS_OUTPUT: &str = "assets";
/// Fixed output name of the favicon.
pub const FAVICON_OUTPUT: &str = "favicon.ico";

/// Extensions of content files copied alongside the rendered pages.
const CONTENT_ASSET_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico"];

/// Output location for a static file, or `None` when it is not one.
pub fn asset_destination(path: &Path, config: &SiteConfig) -> Option<PathBuf> {
    let build = &config.build;

    if path == build.favicon {
        return Some(build.output.join(FAVICON_OUTPUT));
    }
    if let Ok(rel) = path.strip_prefix(&build.assets) {
        return Some(build.output.join(ASSETS_OUTPUT).join(rel));
    }
    if let Ok(rel) = path.strip_prefix(&build.content)
        && !path.starts_with(config.data_dir())
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CONTENT_ASSET_EXTENSIONS.contains(&e))
    {
        return Some(build.output.join(rel));
    }
    None
}

/// Copy one static file to its output location.
///
/// Returns whether the destination changed.
pub fn copy_asset(path: &Path, config: &SiteConfig) -> Result<bool> {
    let dest = asset_destination(path, config)
        .ok_or_else(|| anyhow!("{} is not a static asset", path.display()))?;

    if is_same_file(path, &dest) {
        return Ok(false);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(path, &dest)
        .with_context(|| format!("Failed to copy {} to {}", path.display(), dest.display()))?;
    Ok(true)
}

/// Copy every asset, content image and the favicon.
pub fn copy_all_assets(config: &SiteConfig) -> Result<WriteStats> {
    let build = &config.build;
    let mut files: Vec<PathBuf> = Vec::new();

    if build.assets.is_dir() {
        files.extend(collect_all_files(&build.assets));
    }
    if build.content.is_dir() {
        files.extend(
            collect_all_files(&build.content)
                .into_iter()
                .filter(|p| asset_destination(p, config).is_some()),
        );
    }
    if build.favicon.is_file() {
        files.push(build.favicon.clone());
    } else {
        log!("assets"; "no favicon at {}", build.favicon.display());
    }

    let results: Vec<Result<bool>> = files.par_iter().map(|p| copy_asset(p, config)).collect();

    let mut stats = WriteStats::default();
    for result in results {
        stats.record(result?);
    }
    Ok(stats)
}

/// Same size and same contents.
fn is_same_file(src: &Path, dest: &Path) -> bool {
    let (Ok(a), Ok(b)) = (src.metadata(), dest.metadata()) else {
        return false;
    };
    if a.len() != b.len() {
        return false;
    }
    match (fs::read(src), fs::read(dest)) {
        (Ok(a), Ok(b)) => blake3::hash(&a) == blake3::hash(&b),
        _ => false,
    }
}
