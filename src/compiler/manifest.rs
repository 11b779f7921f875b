//! Client-side route manifest.
//!
//! Every page not excluded from the router becomes a route entry carrying its
//! compiled body. Pages whose slug matches a discovered script also get a
//! component, imported under `<id>Component`. The manifest is emitted as two
//! source fragments substituted into the main entry:
//!
//! ```js
//! __ROUTE_IMPORTS__          // import aboutComponent from "/abs/about.js";
//! const routes = __ROUTES__; // [{ slug: "about", path: "/about/", ... }]
//! ```

use crate::compiler::collect_all_files;
use crate::compiler::pages::full_title;
use crate::config::SiteSection;
use crate::log;
use crate::page::{Page, PathResolver};
use crate::utils::slug::{component_ident, route_slug};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::Write,
    path::{Path, PathBuf},
};

/// Placeholder replaced with the import statements.
pub const ROUTE_IMPORTS_KEY: &str = "__ROUTE_IMPORTS__";
/// Placeholder replaced with the routes array literal.
pub const ROUTES_KEY: &str = "__ROUTES__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMeta {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub slug: String,
    pub path: String,
    /// Compiled page body
    #[serde(skip)]
    pub template: String,
    /// Identifier of the imported component
    pub component: Option<String>,
    pub meta: RouteMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptImport {
    pub ident: String,
    pub slug: String,
    pub script: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteManifest {
    pub imports: Vec<ScriptImport>,
    pub routes: Vec<RouteEntry>,
}

/// Source text for the two placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub imports: String,
    pub routes: String,
}

impl GeneratedSource {
    /// Placeholder substitutions for the main bundle.
    pub fn defines(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (ROUTE_IMPORTS_KEY.to_owned(), self.imports.clone()),
            (ROUTES_KEY.to_owned(), self.routes.clone()),
        ])
    }
}

/// Every `.js` file under the content root outside the data directory,
/// keyed by the slug its path resolves to.
///
/// When two scripts share a slug the first in file name order wins.
pub fn discover_scripts(resolver: &PathResolver, data_dir: &Path) -> FxHashMap<String, PathBuf> {
    let mut scripts: FxHashMap<String, PathBuf> = FxHashMap::default();

    let candidates = collect_all_files(resolver.content_root())
        .into_iter()
        .filter(|p| !p.starts_with(data_dir))
        .filter(|p| p.extension().is_some_and(|e| e == "js"));

    for script in candidates {
        let Ok(url) = resolver.route_url(&script) else {
            continue;
        };
        let slug = route_slug(&url);
        if let Some(existing) = scripts.get(&slug) {
            log!("warn"; "{} shares slug `{slug}` with {}, ignored",
                script.display(), existing.display());
            continue;
        }
        scripts.insert(slug, script);
    }

    scripts
}

impl RouteManifest {
    /// Build entries in store order. Excluded pages get neither an entry nor
    /// an import.
    pub fn build(pages: &[Page], scripts: &FxHashMap<String, PathBuf>, site: &SiteSection) -> Self {
        let mut manifest = Self::default();

        for page in pages.iter().filter(|p| !p.router_excluded()) {
            let component = scripts.get(page.slug()).map(|script| {
                let ident = component_ident(&page.route.id);
                manifest.imports.push(ScriptImport {
                    ident: ident.clone(),
                    slug: page.slug().to_owned(),
                    script: script.clone(),
                });
                ident
            });

            manifest.routes.push(RouteEntry {
                slug: page.slug().to_owned(),
                path: page.url().to_owned(),
                template: page.compiled_body.clone().unwrap_or_default(),
                component,
                meta: RouteMeta {
                    title: full_title(page, site),
                    description: page
                        .description()
                        .unwrap_or(&site.description)
                        .to_owned(),
                },
            });
        }

        manifest
    }

    /// Emit import statements and the routes literal.
    ///
    /// `specifier` maps each import to the module path written in its
    /// `import` statement.
    pub fn generate(&self, specifier: impl Fn(&ScriptImport) -> String) -> GeneratedSource {
        let mut imports = String::new();
        for import in &self.imports {
            let _ = writeln!(
                imports,
                "import {} from {};",
                import.ident,
                js_string(&specifier(import))
            );
        }

        let routes = if self.routes.is_empty() {
            "[]".to_owned()
        } else {
            let mut out = String::from("[\n");
            for route in &self.routes {
                write_route(&mut out, route);
            }
            out.push(']');
            out
        };

        GeneratedSource { imports, routes }
    }
}

fn write_route(out: &mut String, route: &RouteEntry) {
    let _ = writeln!(out, "  {{");
    let _ = writeln!(out, "    slug: {},", js_string(&route.slug));
    let _ = writeln!(out, "    path: {},", js_string(&route.path));
    let _ = writeln!(out, "    template: {},", js_string(&route.template));
    if let Some(component) = &route.component {
        let _ = writeln!(out, "    component: {component},");
    }
    let _ = writeln!(out, "    meta: {{");
    let _ = writeln!(out, "      title: {},", js_string(&route.meta.title));
    let _ = writeln!(out, "      description: {},", js_string(&route.meta.description));
    let _ = writeln!(out, "    }},");
    let _ = writeln!(out, "  }},");
}

/// Quote a string as a JavaScript literal.
fn js_string(value: &str) -> String {
    // JSON string literals are valid JavaScript, save for two line terminators
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_owned())
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Module specifier for an absolute path, with forward slashes.
pub fn path_specifier(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::frontmatter::YamlFrontMatter;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> SiteSection {
        let mut site = SiteSection::default();
        site.title = "Acme".into();
        site.title_suffix = " | Acme".into();
        site.description = "Widgets".into();
        site
    }

    fn compiled(root: &Path, rel: &str, source: &str) -> Page {
        let mut page =
            Page::from_source(&root.join(rel), source, &PathResolver::new(root), &YamlFrontMatter)
                .unwrap();
        page.compiled_body = Some(page.body.clone());
        page
    }

    #[test]
    fn test_discover_scripts_skips_data_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("about")).unwrap();
        fs::create_dir_all(root.join("_data")).unwrap();
        fs::write(root.join("about/about.js"), "").unwrap();
        fs::write(root.join("index.js"), "").unwrap();
        fs::write(root.join("_data/helper.js"), "").unwrap();
        fs::write(root.join("about/about.html"), "").unwrap();

        let scripts = discover_scripts(&PathResolver::new(root), &root.join("_data"));
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts["about"], root.join("about/about.js"));
        assert_eq!(scripts["home"], root.join("index.js"));
    }

    #[test]
    fn test_build_links_components_by_slug() {
        let root = Path::new("/site/content");
        let pages = vec![
            compiled(root, "index.html", "<h1>Home</h1>"),
            compiled(root, "about/about.html", "---\ntitle: About\ndescription: Us\n---\n<p>a</p>"),
        ];
        let scripts = FxHashMap::from_iter([("about".to_owned(), root.join("about/about.js"))]);

        let manifest = RouteManifest::build(&pages, &scripts, &site());

        assert_eq!(manifest.imports.len(), 1);
        assert_eq!(manifest.imports[0].ident, "aboutComponent");
        assert_eq!(manifest.routes[0].path, "/");
        assert_eq!(manifest.routes[0].component, None);
        assert_eq!(manifest.routes[0].meta.title, "Acme | Acme");
        assert_eq!(manifest.routes[0].meta.description, "Widgets");
        assert_eq!(manifest.routes[1].path, "/about/");
        assert_eq!(manifest.routes[1].component.as_deref(), Some("aboutComponent"));
        assert_eq!(manifest.routes[1].meta.title, "About | Acme");
        assert_eq!(manifest.routes[1].template, "<p>a</p>");
    }

    #[test]
    fn test_router_excluded_pages_skipped() {
        let root = Path::new("/site/content");
        let pages = vec![
            compiled(root, "index.html", ""),
            compiled(root, "admin/admin.html", "---\nrouterExclude: true\n---\n"),
        ];
        let scripts = FxHashMap::from_iter([("admin".to_owned(), root.join("admin/admin.js"))]);

        let manifest = RouteManifest::build(&pages, &scripts, &site());
        assert_eq!(manifest.routes.len(), 1);
        assert!(manifest.imports.is_empty());
    }

    #[test]
    fn test_generate_source() {
        let root = Path::new("/site/content");
        let pages = vec![compiled(root, "about/about.html", "<p>\"quoted\"</p>")];
        let scripts = FxHashMap::from_iter([("about".to_owned(), root.join("about/about.js"))]);
        let manifest = RouteManifest::build(&pages, &scripts, &site());

        let source = manifest.generate(|i| format!("/cache/{}.js", i.slug));
        assert_eq!(source.imports, "import aboutComponent from \"/cache/about.js\";\n");
        assert!(source.routes.starts_with("[\n  {\n    slug: \"about\",\n"));
        assert!(source.routes.contains("template: \"<p>\\\"quoted\\\"</p>\","));
        assert!(source.routes.contains("component: aboutComponent,"));
        assert!(source.routes.ends_with("  },\n]"));

        let defines = source.defines();
        assert_eq!(defines[ROUTES_KEY], source.routes);
        assert_eq!(defines[ROUTE_IMPORTS_KEY], source.imports);
    }

    #[test]
    fn test_generate_empty() {
        let source = RouteManifest::default().generate(|_| String::new());
        assert_eq!(source.imports, "");
        assert_eq!(source.routes, "[]");
    }

    #[test]
    fn test_js_string_escapes_line_separators() {
        assert_eq!(js_string("a\u{2028}b"), "\"a\\u2028b\"");
        assert_eq!(js_string("line\nbreak"), "\"line\\nbreak\"");
    }
}
