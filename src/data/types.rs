//! Data types for the cross-page listing.

use crate::page::Page;
use serde::Serialize;
use serde_json::Value;

/// One entry of the `pages` list visible to every template.
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    /// Page URL path (e.g., "/blog/my-post/")
    pub url: String,

    pub slug: String,

    /// Front matter title, falling back to the slug
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Publication date, passed through as written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Whether the page has a bundled script
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_script: bool,
}

impl From<&Page> for PageData {
    fn from(page: &Page) -> Self {
        let tags = match page.front_matter.get("tags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            Some(Value::String(tag)) => vec![tag.clone()],
            _ => Vec::new(),
        };

        Self {
            url: page.url().to_owned(),
            slug: page.slug().to_owned(),
            title: page.title().unwrap_or_else(|| page.slug()).to_owned(),
            description: page.description().map(str::to_owned),
            date: page
                .front_matter
                .get("date")
                .and_then(Value::as_str)
                .map(str::to_owned),
            tags,
            has_script: page.route.script_output.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontmatter::YamlFrontMatter;
    use crate::page::PathResolver;
    use std::path::Path;

    fn page(rel: &str, source: &str) -> Page {
        let root = Path::new("/site/content");
        Page::from_source(&root.join(rel), source, &PathResolver::new(root), &YamlFrontMatter)
            .unwrap()
    }

    #[test]
    fn test_from_page() {
        let page = page(
            "blog/hello.html",
            "---\ntitle: Hello\ndate: 2024-01-15\ntags: [rust, web]\n---\n",
        );
        let data = PageData::from(&page);

        assert_eq!(data.url, "/blog/hello/");
        assert_eq!(data.slug, "blog-hello");
        assert_eq!(data.title, "Hello");
        assert_eq!(data.date.as_deref(), Some("2024-01-15"));
        assert_eq!(data.tags, vec!["rust", "web"]);
        assert!(!data.has_script);
    }

    #[test]
    fn test_title_falls_back_to_slug() {
        let data = PageData::from(&page("about.html", "<p>x</p>"));
        assert_eq!(data.title, "about");

        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("tags").is_none());
        assert!(json.get("has_script").is_none());
    }
}
