//! Page model: a source file, its front matter and its route.

pub mod resolve;
pub mod store;

pub use resolve::PathResolver;
pub use store::PageStore;

use crate::compiler::frontmatter::{FrontMatter, FrontMatterParser};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Route metadata derived from a page's source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRouteMeta {
    /// Normalized url with leading and trailing slash, `/` for the root
    pub url: String,
    /// Dash-joined url segments, `home` for the root
    pub slug: String,
    /// Camel-cased slug, usable as a JavaScript identifier
    pub id: String,
    /// Url path of the rendered html file
    pub output_path: String,
    /// Sibling `.js` source, if one existed at resolve time
    #[serde(skip)]
    pub script_input: Option<PathBuf>,
    /// Url path of the bundled page script
    pub script_output: Option<String>,
}

/// Snippet reference declared in front matter.
///
/// A bare string `"cta"` is shorthand for `{ key = "cta", name = "cta" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetReference {
    pub key: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnippetReference {
    Key(String),
    Named { key: String, name: Option<String> },
}

impl From<RawSnippetReference> for SnippetReference {
    fn from(raw: RawSnippetReference) -> Self {
        match raw {
            RawSnippetReference::Key(key) => Self {
                name: key.clone(),
                key,
            },
            RawSnippetReference::Named { key, name } => Self {
                name: name.unwrap_or_else(|| key.clone()),
                key,
            },
        }
    }
}

/// A source page and everything derived from it.
#[derive(Debug, Clone)]
pub struct Page {
    pub input_path: PathBuf,
    pub route: PageRouteMeta,
    pub front_matter: FrontMatter,
    /// Raw body with front matter removed
    pub body: String,
    /// Body rendered against the page context, set by the content phase
    pub compiled_body: Option<String>,
}

impl Page {
    /// Read, parse and resolve a page source.
    pub fn load(
        input: &Path,
        resolver: &PathResolver,
        parser: &dyn FrontMatterParser,
    ) -> Result<Self> {
        let source = fs::read_to_string(input)
            .with_context(|| format!("Failed to read page {}", input.display()))?;
        Self::from_source(input, &source, resolver, parser)
    }

    /// Build a page from already loaded source text.
    pub fn from_source(
        input: &Path,
        source: &str,
        resolver: &PathResolver,
        parser: &dyn FrontMatterParser,
    ) -> Result<Self> {
        let parsed = parser
            .parse(source)
            .with_context(|| format!("Invalid front matter in {}", input.display()))?;
        let route = resolver.resolve(input)?;

        Ok(Self {
            input_path: input.to_path_buf(),
            route,
            front_matter: parsed.data,
            body: parsed.body,
            compiled_body: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.route.url
    }

    pub fn slug(&self) -> &str {
        &self.route.slug
    }

    pub fn title(&self) -> Option<&str> {
        self.front_matter.get("title").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.front_matter.get("description").and_then(Value::as_str)
    }

    /// Layout named in front matter, if any.
    pub fn layout(&self) -> Option<&str> {
        self.front_matter
            .get("layout")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Pages with a truthy `routerExclude` stay out of the route manifest.
    pub fn router_excluded(&self) -> bool {
        self.front_matter.get("routerExclude").is_some_and(is_truthy)
    }

    /// Snippet references in declaration order.
    ///
    /// Accepts a single key, or a list mixing keys and `{ key, name }` maps.
    /// Entries of any other shape are skipped.
    pub fn snippet_refs(&self) -> Vec<SnippetReference> {
        let Some(value) = self.front_matter.get("snippets") else {
            return Vec::new();
        };

        let items = match value {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        };

        items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RawSnippetReference>(item).ok())
            .map(SnippetReference::from)
            .filter(|r| !r.key.is_empty())
            .collect()
    }
}

/// JavaScript truthiness, so `routerExclude: 1` and `routerExclude: "yes"` both count.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
