//! Template engine seam.
//!
//! Page bodies are rendered inline against the page context; layouts are
//! named templates loaded from `[build.templates]`. A layout name without an
//! extension maps to `<name>.html`.

use anyhow::{Context as _, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tera::{Context, Tera};

/// Values visible to a template while rendering one page.
pub type RenderContext = Map<String, Value>;

pub trait TemplateEngine: Send + Sync {
    /// Render a one-off template source.
    fn render_inline(&self, source: &str, context: &RenderContext) -> Result<String>;

    /// Render the layout named `layout`.
    fn render_layout(&self, layout: &str, context: &RenderContext) -> Result<String>;

    fn has_layout(&self, layout: &str) -> bool;

    /// Raw source of a layout, when the engine can expose it.
    fn layout_source(&self, _layout: &str) -> Option<String> {
        None
    }

    /// Pick up changed layout files. Called before every build pass.
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

/// Template file name for a layout reference.
pub fn layout_file_name(layout: &str) -> String {
    if Path::new(layout).extension().is_some() {
        layout.to_owned()
    } else {
        format!("{layout}.html")
    }
}

/// Tera engine over every `*.html` under the templates directory.
pub struct TeraEngine {
    tera: Mutex<Tera>,
    dir: PathBuf,
}

impl TeraEngine {
    pub fn new(dir: &Path) -> Result<Self> {
        let tera = Self::load(dir)?;
        Ok(Self {
            tera: Mutex::new(tera),
            dir: dir.to_path_buf(),
        })
    }

    fn load(dir: &Path) -> Result<Tera> {
        let mut tera = if dir.is_dir() {
            let glob = format!("{}/**/*.html", dir.display());
            Tera::new(&glob)
                .with_context(|| format!("Failed to load templates from {}", dir.display()))?
        } else {
            Tera::default()
        };
        // Page bodies are html already, layouts embed them verbatim
        tera.autoescape_on(vec![]);
        Ok(tera)
    }

    fn context(context: &RenderContext) -> Result<Context> {
        Context::from_serialize(context).context("Invalid render context")
    }
}

impl TemplateEngine for TeraEngine {
    fn render_inline(&self, source: &str, context: &RenderContext) -> Result<String> {
        let context = Self::context(context)?;
        Ok(self.tera.lock().render_str(source, &context)?)
    }

    fn render_layout(&self, layout: &str, context: &RenderContext) -> Result<String> {
        let context = Self::context(context)?;
        Ok(self.tera.lock().render(&layout_file_name(layout), &context)?)
    }

    fn has_layout(&self, layout: &str) -> bool {
        let name = layout_file_name(layout);
        self.tera.lock().get_template_names().any(|n| n == name)
    }

    fn layout_source(&self, layout: &str) -> Option<String> {
        fs::read_to_string(self.dir.join(layout_file_name(layout))).ok()
    }

    fn reload(&self) -> Result<()> {
        let fresh = Self::load(&self.dir)?;
        *self.tera.lock() = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn context(value: Value) -> RenderContext {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_layout_file_name() {
        assert_eq!(layout_file_name("default"), "default.html");
        assert_eq!(layout_file_name("post.html"), "post.html");
    }

    #[test]
    fn test_render_inline() {
        let engine = TeraEngine::new(Path::new("/nonexistent/templates")).unwrap();
        let out = engine
            .render_inline("<h1>{{ title }}</h1>", &context(json!({ "title": "Hi" })))
            .unwrap();
        assert_eq!(out, "<h1>Hi</h1>");
    }

    #[test]
    fn test_render_layout_does_not_escape_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("default.html"), "<main>{{ content }}</main>").unwrap();
        let engine = TeraEngine::new(dir.path()).unwrap();

        assert!(engine.has_layout("default"));
        assert!(!engine.has_layout("missing"));
        let out = engine
            .render_layout("default", &context(json!({ "content": "<p>x</p>" })))
            .unwrap();
        assert_eq!(out, "<main><p>x</p></main>");
        assert_eq!(engine.layout_source("default").as_deref(), Some("<main>{{ content }}</main>"));
        assert_eq!(engine.layout_source("missing"), None);
    }

    #[test]
    fn test_reload_picks_up_new_layouts() {
        let dir = TempDir::new().unwrap();
        let engine = TeraEngine::new(dir.path()).unwrap();
        assert!(!engine.has_layout("post"));

        fs::write(dir.path().join("post.html"), "{{ title }}").unwrap();
        engine.reload().unwrap();
        assert!(engine.has_layout("post"));
    }

    #[test]
    fn test_render_error_is_reported() {
        let engine = TeraEngine::new(Path::new("/nonexistent/templates")).unwrap();
        assert!(engine.render_inline("{{ missing }}", &RenderContext::new()).is_err());
        assert!(engine.render_inline("{% if %}", &RenderContext::new()).is_err());
    }
}
