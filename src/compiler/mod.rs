//! Page rendering, route manifest codegen and bundling.
//!
//! - **frontmatter**: Split page sources into data and body
//! - **template**: Template engine seam (Tera by default)
//! - **pages**: Two-phase render pipeline
//! - **manifest**: Client-side route manifest and its generated source
//! - **bundle**: Page script staging and bundler invocation
//! - **assets**: Static assets and favicon
//! - **watch**: Debounced rebuild state machine for watch mode
//!
//! # Build Flow
//!
//! ```text
//! compile_pages() ──► RouteManifest ──► bundle_all() ──► render_layouts()
//!       │                  │                 │                  │
//!       ▼                  ▼                 ▼                  ▼
//!  compiled bodies   imports/routes      main.js +        index.html files
//!                        source        page scripts
//! ```

pub mod assets;
pub mod bundle;
pub mod frontmatter;
pub mod manifest;
pub mod pages;
pub mod template;
pub mod watch;

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Collect all files from a directory recursively, in file name order.
pub fn collect_all_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Disk location of a url path such as `/about/index.html` under `output`.
pub fn output_file(output: &Path, url_path: &str) -> PathBuf {
    output.join(url_path.trim_start_matches('/'))
}

/// Write `content` unless the file already holds identical bytes.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    if let Ok(existing) = fs::read(path)
        && blake3::hash(&existing) == blake3::hash(content)
    {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Tally of files written during a pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub unchanged: usize,
}

impl WriteStats {
    pub fn record(&mut self, changed: bool) {
        if changed {
            self.written += 1;
        } else {
            self.unchanged += 1;
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.written += other.written;
        self.unchanged += other.unchanged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_all_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/z.html"), "").unwrap();
        fs::write(dir.path().join("a.html"), "").unwrap();
        fs::write(dir.path().join(".DS_Store"), "").unwrap();

        let files = collect_all_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("a.html"), PathBuf::from("b/z.html")]);
    }

    #[test]
    fn test_output_file() {
        assert_eq!(
            output_file(Path::new("/out"), "/about/index.html"),
            PathBuf::from("/out/about/index.html")
        );
        assert_eq!(output_file(Path::new("/out"), "/index.html"), PathBuf::from("/out/index.html"));
    }

    #[test]
    fn test_write_if_changed_skips_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/index.html");

        assert!(write_if_changed(&path, b"<p>one</p>").unwrap());
        assert!(!write_if_changed(&path, b"<p>one</p>").unwrap());
        assert!(write_if_changed(&path, b"<p>two</p>").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>two</p>");
    }

    #[test]
    fn test_write_stats() {
        let mut stats = WriteStats::default();
        stats.record(true);
        stats.record(false);
        stats.merge(WriteStats { written: 2, unchanged: 0 });
        assert_eq!(stats, WriteStats { written: 3, unchanged: 1 });
    }
}
