//! Build pass error types.
//!
//! Every variant aborts the current build pass. Watch mode logs the error and
//! keeps running, so the next file change can retry.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("`{path}` is outside the content directory `{root}`")]
    OutsideContent { path: PathBuf, root: PathBuf },

    #[error("slug `{slug}` of `{incoming}` is already used by `{existing}`")]
    SlugCollision {
        slug: String,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("component id `{id}` of `{incoming}` is already used by `{existing}`")]
    IdCollision {
        id: String,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("route `{url}` of `{incoming}` is already served by `{existing}`")]
    DuplicateRoute {
        url: String,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("layout `{layout}` used by `{page}` not found")]
    MissingLayout { layout: String, page: PathBuf },

    #[error("{phase} render failed for `{page}`\n{message}")]
    Render {
        phase: &'static str,
        page: PathBuf,
        message: String,
    },

    #[error("bundling `{entry}` failed\n{message}")]
    Bundle { entry: PathBuf, message: String },

    #[error("{count} page script(s) failed to bundle\n{messages}")]
    PageBundles { count: usize, messages: String },
}

impl BuildError {
    /// Configuration errors point at the site layout rather than at a single
    /// template or script.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::OutsideContent { .. }
                | Self::SlugCollision { .. }
                | Self::IdCollision { .. }
                | Self::DuplicateRoute { .. }
                | Self::MissingLayout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_collision_display() {
        let err = BuildError::SlugCollision {
            slug: "blog-my-post".into(),
            existing: "content/blog/my-post.html".into(),
            incoming: "content/blog-my/post.html".into(),
        };
        let message = err.to_string();
        assert!(message.contains("blog-my-post"));
        assert!(message.contains("content/blog-my/post.html"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_render_error_is_not_configuration() {
        let err = BuildError::Render {
            phase: "content",
            page: "content/index.html".into(),
            message: "unexpected `}}`".into(),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().starts_with("content render failed"));
    }
}
