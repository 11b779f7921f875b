//! Script bundling.
//!
//! Two kinds of bundles are produced each pass:
//!
//! - **main**: the application entry with the route manifest substituted in
//! - **page**: one bundle per page script, written next to the page's html
//!
//! Page scripts are plain module bodies. For the main bundle each one is
//! staged as a wrapped copy under `<cache>/page-scripts/`, turning the body
//! into a default-exported function the router can call on navigation.

use crate::compiler::{WriteStats, write_if_changed};
use crate::error::BuildError;
use crate::exec;
use crate::log;
use anyhow::{Context, Result};
use rayon::prelude::*;
use regex::{Captures, Regex};
use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};

/// Directory under the cache holding wrapped page scripts.
pub const STAGE_DIR: &str = "page-scripts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub entry: PathBuf,
    /// Literal text substitutions applied to the entry source
    pub defines: BTreeMap<String, String>,
    pub minify: bool,
}

/// Turns an entry module into a single self-contained script.
pub trait Bundler: Send + Sync {
    fn bundle(&self, request: &BundleRequest) -> Result<String>;
}

/// Runs an esbuild-compatible command, feeding the entry through stdin.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    command: Vec<String>,
}

impl EsbuildBundler {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Bundler for EsbuildBundler {
    fn bundle(&self, request: &BundleRequest) -> Result<String> {
        let source = fs::read_to_string(&request.entry)
            .with_context(|| format!("Failed to read {}", request.entry.display()))?;
        let source = apply_defines(&source, &request.defines);

        // Relative imports in the entry resolve from the working directory
        let dir = request.entry.parent().unwrap_or_else(|| Path::new("."));
        let name = request
            .entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let output = exec!(stdin=source.as_str(); dir; &self.command;
            "--bundle",
            "--format=esm",
            format!("--sourcefile={name}"),
            if request.minify { "--minify" } else { "" },
        )?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Replace every occurrence of each define key, in key order.
pub fn apply_defines(source: &str, defines: &BTreeMap<String, String>) -> String {
    defines
        .iter()
        .fold(source.to_owned(), |acc, (key, value)| acc.replace(key.as_str(), value))
}

// ============================================================================
// Page script staging
// ============================================================================

static RE_STATIC_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+(?:[\w$*{}\s,]+?\s+from\s+)?["'][^"'\n]+["'][ \t]*;?[ \t]*$\n?"#)
        .unwrap()
});

static RE_RELATIVE_SPECIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(["'])(\.{1,2}/[^"'\n]+)(["'])"#).unwrap());

/// Wrap a page script body in a default-exported function.
///
/// Static imports are hoisted above the function, with relative specifiers
/// made absolute against `script_dir` so the staged copy resolves the same
/// modules from its new location.
pub fn wrap_page_script(source: &str, script_dir: &Path) -> String {
    let mut hoisted = String::new();
    for m in RE_STATIC_IMPORT.find_iter(source) {
        let import = m.as_str().trim();
        let import = RE_RELATIVE_SPECIFIER.replace_all(import, |caps: &Captures<'_>| {
            let absolute = normalize(&script_dir.join(&caps[2]));
            format!("{}{}{}", &caps[1], absolute.to_string_lossy().replace('\\', "/"), &caps[3])
        });
        hoisted.push_str(&import);
        hoisted.push('\n');
    }

    let body = RE_STATIC_IMPORT.replace_all(source, "");
    let body = body.trim_end();
    format!("{hoisted}export default function () {{\n{body}\n}}\n")
}

/// Write the wrapped copy of `script` to `<stage_dir>/<slug>.js`.
pub fn stage_page_script(script: &Path, stage_dir: &Path, slug: &str) -> Result<PathBuf> {
    let source = fs::read_to_string(script)
        .with_context(|| format!("Failed to read page script {}", script.display()))?;
    let dir = script.parent().unwrap_or_else(|| Path::new("/"));
    let staged = stage_dir.join(format!("{slug}.js"));
    write_if_changed(&staged, wrap_page_script(&source, dir).as_bytes())?;
    Ok(staged)
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

// ============================================================================
// Running bundles
// ============================================================================

/// A bundle and the file it is written to.
#[derive(Debug, Clone)]
pub struct BundleJob {
    pub request: BundleRequest,
    pub output: PathBuf,
}

impl BundleJob {
    fn run(&self, bundler: &dyn Bundler) -> Result<bool, BuildError> {
        let code = bundler.bundle(&self.request).map_err(|e| self.error(&e))?;
        write_if_changed(&self.output, code.as_bytes()).map_err(|e| self.error(&e))
    }

    fn error(&self, err: &anyhow::Error) -> BuildError {
        BuildError::Bundle {
            entry: self.request.entry.clone(),
            message: format!("{err:#}"),
        }
    }
}

/// Run the main bundle alongside every page bundle and wait for all of them.
///
/// A main bundle failure wins; otherwise page failures are reported together.
pub fn bundle_all(
    bundler: &dyn Bundler,
    main: Option<&BundleJob>,
    pages: &[BundleJob],
) -> Result<WriteStats, BuildError> {
    let (main_result, page_results) = rayon::join(
        || main.map(|job| job.run(bundler)),
        || pages.par_iter().map(|job| job.run(bundler)).collect::<Vec<_>>(),
    );

    let mut stats = WriteStats::default();
    let mut failures = Vec::new();
    for result in page_results {
        match result {
            Ok(changed) => stats.record(changed),
            Err(e) => failures.push(e),
        }
    }

    if let Some(result) = main_result {
        match result {
            Ok(changed) => stats.record(changed),
            Err(e) => {
                for failure in &failures {
                    log!("error"; "{failure}");
                }
                return Err(e);
            }
        }
    }

    match failures.len() {
        0 => Ok(stats),
        1 => Err(failures.remove(0)),
        count => Err(BuildError::PageBundles {
            count,
            messages: failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_apply_defines() {
        let defines = BTreeMap::from([
            ("__ROUTES__".to_owned(), "[]".to_owned()),
            ("__ROUTE_IMPORTS__".to_owned(), "import a from \"a\";".to_owned()),
        ]);
        let out = apply_defines("__ROUTE_IMPORTS__\nconst r = __ROUTES__;", &defines);
        assert_eq!(out, "import a from \"a\";\nconst r = [];");
    }

    #[test]
    fn test_wrap_hoists_imports() {
        let source = "import { h } from \"./dom.js\";\nimport '../styles.css';\nimport x, * as y from 'lib';\n\nconst el = h('p');\ndocument.body.append(el);\n";
        let wrapped = wrap_page_script(source, Path::new("/site/content/about"));

        assert_eq!(
            wrapped,
            "import { h } from \"/site/content/about/dom.js\";\n\
             import '/site/content/styles.css';\n\
             import x, * as y from 'lib';\n\
             export default function () {\n\
             \n\
             const el = h('p');\n\
             document.body.append(el);\n\
             }\n"
        );
    }

    #[test]
    fn test_wrap_multiline_import() {
        let source = "import {\n  a,\n  b,\n} from './ab.js';\nrun(a, b);";
        let wrapped = wrap_page_script(source, Path::new("/p"));
        assert!(wrapped.starts_with("import {\n  a,\n  b,\n} from '/p/ab.js';\n"));
        assert!(wrapped.ends_with("export default function () {\nrun(a, b);\n}\n"));
    }

    #[test]
    fn test_wrap_leaves_dynamic_imports() {
        let wrapped = wrap_page_script("const m = await import('./lazy.js');", Path::new("/p"));
        assert_eq!(
            wrapped,
            "export default function () {\nconst m = await import('./lazy.js');\n}\n"
        );
    }

    #[test]
    fn test_stage_page_script() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("about.js");
        fs::write(&script, "console.log('about');").unwrap();

        let staged = stage_page_script(&script, &dir.path().join(STAGE_DIR), "about").unwrap();
        assert_eq!(staged, dir.path().join("page-scripts/about.js"));
        assert_eq!(
            fs::read_to_string(staged).unwrap(),
            "export default function () {\nconsole.log('about');\n}\n"
        );
    }

    #[derive(Default)]
    struct FakeBundler {
        seen: Mutex<Vec<PathBuf>>,
    }

    impl Bundler for FakeBundler {
        fn bundle(&self, request: &BundleRequest) -> Result<String> {
            self.seen.lock().push(request.entry.clone());
            if request.entry.ends_with("broken.js") {
                bail!("syntax error");
            }
            Ok(format!("// {}", request.entry.display()))
        }
    }

    fn job(dir: &Path, name: &str) -> BundleJob {
        BundleJob {
            request: BundleRequest {
                entry: dir.join(name),
                defines: BTreeMap::new(),
                minify: false,
            },
            output: dir.join("out").join(name),
        }
    }

    #[test]
    fn test_bundle_all_runs_every_job() {
        let dir = TempDir::new().unwrap();
        let bundler = FakeBundler::default();
        let main = job(dir.path(), "main.js");
        let pages = vec![job(dir.path(), "a.js"), job(dir.path(), "b.js")];

        let stats = bundle_all(&bundler, Some(&main), &pages).unwrap();
        assert_eq!(stats.written, 3);
        assert_eq!(bundler.seen.lock().len(), 3);
        assert!(dir.path().join("out/a.js").is_file());

        let again = bundle_all(&bundler, Some(&main), &pages).unwrap();
        assert_eq!(again.unchanged, 3);
    }

    #[test]
    fn test_bundle_all_surfaces_page_failure() {
        let dir = TempDir::new().unwrap();
        let bundler = FakeBundler::default();
        let pages = vec![job(dir.path(), "a.js"), job(dir.path(), "broken.js")];

        let err = bundle_all(&bundler, None, &pages).unwrap_err();
        assert!(matches!(err, BuildError::Bundle { ref entry, .. } if entry.ends_with("broken.js")));
        // The healthy page still finished
        assert!(dir.path().join("out/a.js").is_file());
    }

    #[test]
    fn test_bundle_all_main_failure_wins() {
        let dir = TempDir::new().unwrap();
        let bundler = FakeBundler::default();
        let main = job(dir.path(), "broken.js");
        let pages = vec![job(dir.path(), "a.js")];

        let err = bundle_all(&bundler, Some(&main), &pages).unwrap_err();
        assert!(matches!(err, BuildError::Bundle { .. }));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.js")), PathBuf::from("/a/c/d.js"));
    }
}
