//! Source path to route metadata.
//!
//! | Source (under content root) | url           | slug           | script output            |
//! |-----------------------------|---------------|----------------|--------------------------|
//! | `index.html`                | `/`           | `home`         | `/home.js`               |
//! | `about/about.html`          | `/about/`     | `about`        | `/about/about.js`        |
//! | `about/index.html`          | `/about/`     | `about`        | `/about/about.js`        |
//! | `blog/my-post.html`         | `/blog/my-post/` | `blog-my-post` | `/blog/my-post/post.js` |
//!
//! The script columns only apply when a sibling `<name>.js` exists.

use super::PageRouteMeta;
use crate::error::BuildError;
use crate::utils::slug::{camel_case_id, last_segment, route_slug};
use std::path::{Component, Path, PathBuf};

/// Base name that always maps to its directory's route.
const INDEX_NAME: &str = "index";
/// Extension of page scripts next to their page source.
pub const SCRIPT_EXT: &str = "js";
/// Rendered artifact file name under each route.
pub const OUTPUT_FILE: &str = "index.html";

/// Maps files under a content root to route metadata.
#[derive(Debug, Clone)]
pub struct PathResolver {
    content_root: PathBuf,
}

impl PathResolver {
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
        }
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    /// Route url for any file under the content root (page or script).
    ///
    /// The base name is dropped when it is `index` or repeats the parent
    /// directory name, so `foo/foo.html` and `foo/index.html` share `/foo/`.
    pub fn route_url(&self, input: &Path) -> Result<String, BuildError> {
        let relative = input
            .strip_prefix(&self.content_root)
            .map_err(|_| BuildError::OutsideContent {
                path: input.to_path_buf(),
                root: self.content_root.clone(),
            })?;

        let mut segments: Vec<String> = relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let stem = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let is_section_index = stem == INDEX_NAME || segments.last() == Some(&stem);
        if !is_section_index && !stem.is_empty() {
            segments.push(stem);
        }

        Ok(if segments.is_empty() {
            "/".to_owned()
        } else {
            format!("/{}/", segments.join("/"))
        })
    }

    /// Resolve a page source into its route metadata.
    ///
    /// Checks the filesystem for a sibling script, so the result depends on
    /// disk state at call time.
    pub fn resolve(&self, input: &Path) -> Result<PageRouteMeta, BuildError> {
        let url = self.route_url(input)?;
        let slug = route_slug(&url);
        let id = camel_case_id(&slug);
        let output_path = format!("{url}{OUTPUT_FILE}");

        let script = input.with_extension(SCRIPT_EXT);
        let (script_input, script_output) = if script.is_file() {
            let output = format!("{url}{}.{SCRIPT_EXT}", last_segment(&slug));
            (Some(script), Some(output))
        } else {
            (None, None)
        };

        Ok(PageRouteMeta {
            url,
            slug,
            id,
            output_path,
            script_input,
            script_output,
        })
    }
}
