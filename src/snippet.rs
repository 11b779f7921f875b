//! Reusable content fragments referenced from page front matter.
//!
//! Keys are collected as pages enter the store, fetched from a
//! [`SnippetSource`] in one batch before the first render, and looked up per
//! page while building render contexts. Keys registered after that batch
//! (new references in watch mode) are not fetched and render empty with a
//! diagnostic until the process restarts.

use crate::log;
use crate::page::SnippetReference;
use anyhow::{Context, Result};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// `snippets.name` or `snippets["name"]` inside a template.
static RE_SNIPPET_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsnippets\s*(?:\.\s*([A-Za-z_]\w*)|\[\s*["']([^"'\]]+)["']\s*\])"#).unwrap()
});

/// Names a template reads from `snippets`, in first-use order.
pub fn referenced_names(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in RE_SNIPPET_REF.captures_iter(source) {
        let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if !names.iter().any(|n| n == name.as_str()) {
            names.push(name.as_str().to_owned());
        }
    }
    names
}

/// Fetches snippet content by key.
pub trait SnippetSource: Send + Sync {
    /// Content for each key the source knows. Unknown keys are omitted.
    fn fetch(&self, keys: &BTreeSet<String>) -> Result<FxHashMap<String, String>>;
}

/// Reads `<dir>/<key>.html`, `.md` or `.txt`, first match wins.
#[derive(Debug, Clone)]
pub struct DirSnippetSource {
    dir: PathBuf,
}

const SNIPPET_EXTENSIONS: &[&str] = &["html", "md", "txt"];

impl DirSnippetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        if key.contains(['/', '\\']) || key.contains("..") {
            return None;
        }
        SNIPPET_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{key}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl SnippetSource for DirSnippetSource {
    fn fetch(&self, keys: &BTreeSet<String>) -> Result<FxHashMap<String, String>> {
        let mut found = FxHashMap::default();
        for key in keys {
            if let Some(path) = self.path_for(key) {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read snippet {}", path.display()))?;
                found.insert(key.clone(), content);
            }
        }
        Ok(found)
    }
}

/// A snippet reference that had no content when a page was rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetDiagnostic {
    pub key: String,
    pub page: PathBuf,
}

#[derive(Debug, Default)]
pub struct SnippetRegistry {
    known: BTreeSet<String>,
    resolved: FxHashMap<String, String>,
    fetched: bool,
    diagnostics: Vec<SnippetDiagnostic>,
}

impl SnippetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_refs(&mut self, refs: &[SnippetReference]) {
        self.known.extend(refs.iter().map(|r| r.key.clone()));
    }

    pub fn known_keys(&self) -> impl Iterator<Item = &String> {
        self.known.iter()
    }

    pub const fn is_resolved(&self) -> bool {
        self.fetched
    }

    /// Fetch every registered key. Only the first call reaches the source.
    ///
    /// Returns how many keys resolved to content.
    pub fn resolve_all(&mut self, source: &dyn SnippetSource) -> Result<usize> {
        if self.fetched {
            return Ok(self.resolved.len());
        }
        self.resolved = source.fetch(&self.known)?;
        self.fetched = true;
        Ok(self.resolved.len())
    }

    /// Content for `key`, or empty with a diagnostic when it never resolved.
    pub fn lookup(&mut self, key: &str, page: &Path) -> String {
        if let Some(content) = self.resolved.get(key) {
            return content.clone();
        }
        log!("snippet"; "unknown snippet `{key}` in {}", page.display());
        self.diagnostics.push(SnippetDiagnostic {
            key: key.to_owned(),
            page: page.to_path_buf(),
        });
        String::new()
    }

    /// Template-facing `snippets` object for one page: `name -> content`.
    ///
    /// Declared references come first. Names read by `templates` but never
    /// declared are looked up as keys, so they render empty with a
    /// diagnostic instead of failing the render.
    pub fn context_for(
        &mut self,
        refs: &[SnippetReference],
        templates: &[&str],
        page: &Path,
    ) -> Map<String, Value> {
        let mut map: Map<String, Value> = refs
            .iter()
            .map(|r| (r.name.clone(), Value::String(self.lookup(&r.key, page))))
            .collect();

        for source in templates {
            for name in referenced_names(source) {
                if !map.contains_key(&name) {
                    let content = self.lookup(&name, page);
                    map.insert(name, Value::String(content));
                }
            }
        }
        map
    }

    pub fn diagnostics(&self) -> &[SnippetDiagnostic] {
        &self.diagnostics
    }

    /// Drain diagnostics collected since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<SnippetDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingSource {
        calls: Mutex<usize>,
    }

    impl SnippetSource for CountingSource {
        fn fetch(&self, keys: &BTreeSet<String>) -> Result<FxHashMap<String, String>> {
            *self.calls.lock() += 1;
            Ok(keys
                .iter()
                .filter(|k| k.as_str() != "missing")
                .map(|k| (k.clone(), format!("<{k}>")))
                .collect())
        }
    }

    fn refs(keys: &[&str]) -> Vec<SnippetReference> {
        keys.iter()
            .map(|k| SnippetReference { key: (*k).into(), name: (*k).into() })
            .collect()
    }

    #[test]
    fn test_resolve_all_fetches_once() {
        let source = CountingSource::default();
        let mut registry = SnippetRegistry::new();
        registry.register_refs(&refs(&["cta", "footer"]));

        assert_eq!(registry.resolve_all(&source).unwrap(), 2);
        registry.register_refs(&refs(&["late"]));
        registry.resolve_all(&source).unwrap();

        assert_eq!(*source.calls.lock(), 1);
        assert!(registry.is_resolved());
    }

    #[test]
    fn test_lookup_unknown_records_diagnostic() {
        let source = CountingSource::default();
        let mut registry = SnippetRegistry::new();
        registry.register_refs(&refs(&["cta", "missing"]));
        registry.resolve_all(&source).unwrap();

        let page = Path::new("content/index.html");
        assert_eq!(registry.lookup("cta", page), "<cta>");
        assert_eq!(registry.lookup("missing", page), "");
        assert_eq!(
            registry.diagnostics(),
            &[SnippetDiagnostic { key: "missing".into(), page: page.into() }]
        );
    }

    #[test]
    fn test_key_registered_after_resolution_is_unknown() {
        let mut registry = SnippetRegistry::new();
        registry.resolve_all(&CountingSource::default()).unwrap();
        registry.register_refs(&refs(&["late"]));

        assert_eq!(registry.lookup("late", Path::new("a.html")), "");
        assert_eq!(registry.take_diagnostics().len(), 1);
        assert!(registry.diagnostics().is_empty());
    }

    #[test]
    fn test_context_for_uses_names() {
        let mut registry = SnippetRegistry::new();
        let page_refs = vec![SnippetReference { key: "footer-links".into(), name: "links".into() }];
        registry.register_refs(&page_refs);
        registry.resolve_all(&CountingSource::default()).unwrap();

        let map = registry.context_for(&page_refs, &["{{ snippets.links }}"], Path::new("a.html"));
        assert_eq!(map.get("links"), Some(&Value::String("<footer-links>".into())));
        assert!(registry.diagnostics().is_empty());
    }

    #[test]
    fn test_context_for_covers_undeclared_names() {
        let mut registry = SnippetRegistry::new();
        registry.resolve_all(&CountingSource::default()).unwrap();

        let body = r#"{{ snippets["missing-key"] }} {{ snippets.aside }} {{ snippets['missing-key'] }}"#;
        let map = registry.context_for(&[], &[body, "{{ snippets.aside }}"], Path::new("a.html"));

        assert_eq!(map.get("missing-key"), Some(&Value::String(String::new())));
        assert_eq!(map.get("aside"), Some(&Value::String(String::new())));
        let keys: Vec<_> = registry.diagnostics().iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["missing-key", "aside"]);
    }

    #[test]
    fn test_referenced_names() {
        let source = r#"{{ snippets.cta }}{% if snippets [ "a-b" ] %}{{ snippets.cta }}{% endif %}{{ mysnippets.x }}"#;
        assert_eq!(referenced_names(source), vec!["cta", "a-b"]);
    }

    #[test]
    fn test_dir_source_reads_known_extensions() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cta.html"), "<a>Buy</a>").unwrap();
        fs::write(dir.path().join("note.txt"), "plain").unwrap();

        let keys: BTreeSet<String> =
            ["cta", "note", "absent", "../escape"].iter().map(|s| (*s).to_owned()).collect();
        let found = DirSnippetSource::new(dir.path()).fetch(&keys).unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["cta"], "<a>Buy</a>");
        assert_eq!(found["note"], "plain");
    }
}
