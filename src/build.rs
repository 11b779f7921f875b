//! Site building orchestration.
//!
//! A [`BuildSession`] owns everything that outlives a single pass: the page
//! store, the snippet registry, the collaborators and registered hooks. Build
//! mode runs one pass; watch mode keeps the session and runs a pass per
//! batch of file events.
//!
//! # Pass
//!
//! ```text
//! build()
//!     │
//!     ├── beforeBuild hook
//!     ├── resolve snippets (first pass only)
//!     ├── compile_pages()         every page body ──► compiled_body
//!     ├── afterCompilePages hook
//!     ├── RouteManifest           stage page scripts, generate imports/routes
//!     ├── bundle_all()            main bundle ║ page bundles, all joined
//!     ├── render_layouts()        layouts ──► minify ──► write if changed
//!     ├── afterBuildPages hook
//!     ├── copy_all_assets()       assets, content images, favicon
//!     └── afterBuild hook         BuildManifest
//! ```

use crate::{
    compiler::{
        WriteStats, collect_all_files,
        assets::{copy_all_assets, copy_asset},
        bundle::{
            BundleJob, BundleRequest, Bundler, EsbuildBundler, STAGE_DIR, bundle_all,
            stage_page_script,
        },
        frontmatter::{FrontMatterParser, YamlFrontMatter},
        manifest::{RouteManifest, discover_scripts, path_specifier},
        output_file,
        pages::RenderPipeline,
        template::{TemplateEngine, TeraEngine},
        watch::{FileEvent, QueuedEvent},
        write_if_changed,
    },
    config::SiteConfig,
    data::load_shared_data,
    hooks::{HookArgs, Hooks, command_hook},
    log,
    page::{Page, PageStore, PathResolver},
    snippet::{DirSnippetSource, SnippetDiagnostic, SnippetRegistry, SnippetSource},
    utils::{
        category::{FileCategory, categorize_path},
        minify::minify_html,
    },
};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

/// Pluggable pieces of the pipeline.
pub struct Collaborators {
    pub engine: Box<dyn TemplateEngine>,
    pub bundler: Box<dyn Bundler>,
    pub parser: Box<dyn FrontMatterParser>,
    pub snippets: Box<dyn SnippetSource>,
}

impl Collaborators {
    /// Tera, esbuild, YAML front matter and the snippets directory.
    pub fn defaults(config: &SiteConfig) -> Result<Self> {
        Ok(Self {
            engine: Box::new(TeraEngine::new(&config.build.templates)?),
            bundler: Box::new(EsbuildBundler::new(config.build.bundle.command.clone())),
            parser: Box::new(YamlFrontMatter),
            snippets: Box::new(DirSnippetSource::new(config.build.snippets.clone())),
        })
    }
}

/// One page as written by a pass.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestPage {
    pub url: String,
    pub slug: String,
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
}

/// Summary of a finished pass, passed to `afterBuild` hooks.
#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest {
    pub pages: Vec<ManifestPage>,
    pub routes: RouteManifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_bundle: Option<PathBuf>,
    /// Every snippet key referenced by a page
    pub snippets: Vec<String>,
    pub written: usize,
    pub unchanged: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snippet_diagnostics: Vec<SnippetDiagnostic>,
}

/// Outcome of applying a batch of watch events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    /// Whether a full pass is needed
    pub rebuild: bool,
    /// Static files copied directly
    pub copied: usize,
}

pub struct BuildSession {
    config: SiteConfig,
    resolver: PathResolver,
    store: PageStore,
    snippets: SnippetRegistry,
    collaborators: Collaborators,
    hooks: Hooks,
    /// Pages the store rejected, retried after every event batch
    deferred: BTreeSet<PathBuf>,
    passes: usize,
}

impl BuildSession {
    pub fn new(config: SiteConfig, collaborators: Collaborators) -> Self {
        let resolver = PathResolver::new(config.build.content.clone());
        Self {
            config,
            resolver,
            store: PageStore::new(),
            snippets: SnippetRegistry::new(),
            collaborators,
            hooks: Hooks::new(),
            deferred: BTreeSet::new(),
            passes: 0,
        }
    }

    /// Default collaborators plus the `[[hooks]]` commands from config.
    pub fn with_defaults(config: SiteConfig) -> Result<Self> {
        let collaborators = Collaborators::defaults(&config)?;
        let mut session = Self::new(config, collaborators);
        session.register_config_hooks()?;
        Ok(session)
    }

    /// Register every `[[hooks]]` entry, in file order.
    pub fn register_config_hooks(&mut self) -> Result<()> {
        let root = self.config.get_root().to_path_buf();
        for hook in &self.config.hooks {
            let run = command_hook(hook.command.clone(), root.clone());
            self.hooks.register_named(&hook.point, run)?;
        }
        Ok(())
    }

    pub const fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub const fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Load every `.html` under the content root, outside the data directory.
    ///
    /// # Errors
    /// Every page is attempted. The first unreadable or colliding page is
    /// returned after the scan and the rest are logged; rejected pages are
    /// kept for retry by [`apply_events`](Self::apply_events).
    pub fn discover(&mut self) -> Result<usize> {
        let data_dir = self.config.data_dir();
        let sources: Vec<PathBuf> = collect_all_files(&self.config.build.content)
            .into_iter()
            .filter(|p| !p.starts_with(&data_dir))
            .filter(|p| p.extension().is_some_and(|e| e == "html"))
            .collect();

        let mut errors = Vec::new();
        for source in sources {
            if let Err(e) = self.add_page(&source) {
                self.deferred.insert(source);
                errors.push(e);
            }
        }

        log!("pages"; "found {} pages", self.store.len());
        first_error(errors)?;
        Ok(self.store.len())
    }

    fn add_page(&mut self, path: &Path) -> Result<()> {
        let page = self.load_page(path)?;
        self.store.add(page, &mut self.snippets)?;
        Ok(())
    }

    pub fn load_page(&self, path: &Path) -> Result<Page> {
        Page::load(path, &self.resolver, self.collaborators.parser.as_ref())
    }

    /// Run one full pass over the current store.
    pub fn build(&mut self) -> Result<BuildManifest> {
        let build = &self.config.build;
        if self.passes == 0 && build.clean && build.output.exists() {
            fs::remove_dir_all(&build.output).with_context(|| {
                format!("Failed to clear output directory: {}", build.output.display())
            })?;
        }
        self.passes += 1;

        self.hooks.run(HookArgs::BeforeBuild(&self.config))?;

        if !self.snippets.is_resolved() {
            let found = self.snippets.resolve_all(self.collaborators.snippets.as_ref())?;
            log!("snippet"; "resolved {found} snippets");
        }

        let engine = self.collaborators.engine.as_ref();
        engine.reload()?;
        let shared = load_shared_data(&self.config)?;
        let pipeline = RenderPipeline::new(
            engine,
            &shared,
            &self.config.site,
            &self.config.build.default_layout,
        );

        // Phase 1
        let contexts = pipeline.prepare(self.store.pages(), &mut self.snippets);
        pipeline.compile_pages(self.store.pages_mut(), &contexts)?;
        self.hooks.run(HookArgs::AfterCompilePages(self.store.pages()))?;

        // Manifest and bundles
        let routes = self.route_manifest()?;
        let bundle_stats = self.run_bundles(&routes)?;

        // Phase 2
        let rendered = pipeline.render_layouts(self.store.pages(), &contexts)?;
        let output = &self.config.build.output;
        let mut page_stats = WriteStats::default();
        for page in &rendered {
            let html = minify_html(&page.html, self.config.build.minify);
            let target = output_file(output, &page.output_path);
            page_stats.record(write_if_changed(&target, html.as_bytes())?);
        }
        self.hooks.run(HookArgs::AfterBuildPages(self.store.pages()))?;

        let asset_stats = copy_all_assets(&self.config)?;

        let mut stats = page_stats;
        stats.merge(bundle_stats);
        stats.merge(asset_stats);
        let manifest = self.build_manifest(routes, stats);
        self.hooks.run(HookArgs::AfterBuild(&manifest))?;

        if self.store.is_empty() {
            log!("warn"; "no pages under {}", self.config.build.content.display());
        }
        log!("build"; "{} pages, {} files written, {} unchanged",
            manifest.pages.len(), stats.written, stats.unchanged);
        Ok(manifest)
    }

    /// Discover scripts, stage wrapped copies and build the route manifest.
    fn route_manifest(&self) -> Result<RouteManifest> {
        let scripts = discover_scripts(&self.resolver, &self.config.data_dir());
        Ok(RouteManifest::build(self.store.pages(), &scripts, &self.config.site))
    }

    fn run_bundles(&self, routes: &RouteManifest) -> Result<WriteStats> {
        let stage_dir = self.config.build.cache.join(STAGE_DIR);
        let mut staged: FxHashMap<&str, PathBuf> = FxHashMap::default();
        for import in &routes.imports {
            let path = stage_page_script(&import.script, &stage_dir, &import.slug)?;
            staged.insert(import.slug.as_str(), path);
        }
        let source = routes.generate(|import| {
            staged
                .get(import.slug.as_str())
                .map_or_else(|| path_specifier(&import.script), |p| path_specifier(p))
        });

        let bundle = &self.config.build.bundle;
        let main = bundle.entry.is_file().then(|| BundleJob {
            request: BundleRequest {
                entry: bundle.entry.clone(),
                defines: source.defines(),
                minify: bundle.minify,
            },
            output: self.main_bundle_output(),
        });
        if main.is_none() {
            log!("bundle"; "no entry at {}, skipping main bundle", bundle.entry.display());
        }

        let pages: Vec<BundleJob> = self
            .store
            .iter()
            .filter_map(|page| {
                let input = page.route.script_input.as_ref()?;
                let output = page.route.script_output.as_ref()?;
                Some(BundleJob {
                    request: BundleRequest {
                        entry: input.clone(),
                        defines: Default::default(),
                        minify: bundle.minify,
                    },
                    output: output_file(&self.config.build.output, output),
                })
            })
            .collect();

        Ok(bundle_all(
            self.collaborators.bundler.as_ref(),
            main.as_ref(),
            &pages,
        )?)
    }

    /// `<output>/<entry stem>.js`
    fn main_bundle_output(&self) -> PathBuf {
        let stem = self
            .config
            .build
            .bundle
            .entry
            .file_stem()
            .map_or_else(|| "main".to_owned(), |s| s.to_string_lossy().into_owned());
        self.config.build.output.join(format!("{stem}.js"))
    }

    fn build_manifest(&mut self, routes: RouteManifest, stats: WriteStats) -> BuildManifest {
        let output = &self.config.build.output;
        let pages = self
            .store
            .iter()
            .map(|page| ManifestPage {
                url: page.url().to_owned(),
                slug: page.slug().to_owned(),
                input: page.input_path.clone(),
                output: output_file(output, &page.route.output_path),
                script: page
                    .route
                    .script_output
                    .as_ref()
                    .map(|s| output_file(output, s)),
            })
            .collect();

        BuildManifest {
            pages,
            routes,
            main_bundle: self
                .config
                .build
                .bundle
                .entry
                .is_file()
                .then(|| self.main_bundle_output()),
            snippets: self.snippets.known_keys().cloned().collect(),
            written: stats.written,
            unchanged: stats.unchanged,
            snippet_diagnostics: self.snippets.take_diagnostics(),
        }
    }

    // ========================================================================
    // Watch events
    // ========================================================================

    /// Apply a batch of file events to the store, in order.
    ///
    /// Every event is applied even when an earlier one fails; the first error
    /// is returned after the batch and the rest are logged. Pages rejected by
    /// an earlier batch are then retried, so removing the page they collided
    /// with brings them back without touching them again.
    pub fn apply_events(&mut self, events: &[QueuedEvent]) -> Result<EventOutcome> {
        let mut outcome = EventOutcome::default();
        let mut errors = Vec::new();

        for event in events {
            let category = categorize_path(&event.path, &self.config);
            let result = match category {
                FileCategory::Page => self.apply_page_event(event),
                FileCategory::Script => {
                    self.refresh_script_owner(&event.path);
                    Ok(())
                }
                FileCategory::Image => self.copy_image(event).map(|copied| {
                    outcome.copied += usize::from(copied);
                }),
                FileCategory::Style
                | FileCategory::Layout
                | FileCategory::Data
                | FileCategory::Unknown => Ok(()),
            };
            outcome.rebuild |= category.triggers_rebuild();
            if let Err(e) = result {
                errors.push(e);
            }
        }

        // Only batches that lead to a pass can have cleared a conflict
        if outcome.rebuild {
            let touched: BTreeSet<&Path> = events.iter().map(|e| e.path.as_path()).collect();
            self.retry_deferred(&touched);
        }

        first_error(errors)?;
        Ok(outcome)
    }

    /// Give rejected pages not named in the current batch another attempt.
    fn retry_deferred(&mut self, touched: &BTreeSet<&Path>) {
        let pending: Vec<PathBuf> = self
            .deferred
            .iter()
            .filter(|p| !touched.contains(p.as_path()))
            .cloned()
            .collect();

        for path in pending {
            let retry = QueuedEvent { kind: FileEvent::Change, path };
            match self.apply_page_event(&retry) {
                Ok(()) if self.store.find_by_input(&retry.path).is_some() => {
                    log!("pages"; "accepted {}", self.rel(&retry.path));
                }
                Ok(()) => {}
                Err(e) => log!("pages"; "still rejected {}: {e}", self.rel(&retry.path)),
            }
        }
    }

    fn rel<'p>(&self, path: &'p Path) -> std::path::Display<'p> {
        path.strip_prefix(&self.config.build.content).unwrap_or(path).display()
    }

    fn apply_page_event(&mut self, event: &QueuedEvent) -> Result<()> {
        let path = &event.path;
        let existing = self.store.find_by_input(path).map(|p| p.url().to_owned());

        match event.kind {
            FileEvent::Unlink => {
                self.deferred.remove(path);
                if let Some(url) = existing
                    && let Some(page) = self.store.remove(&url)
                {
                    self.remove_outputs(&page);
                    log!("pages"; "removed {url}");
                }
                Ok(())
            }
            FileEvent::Add | FileEvent::Change => {
                // Gone again before the batch ran
                if !path.is_file() {
                    self.deferred.remove(path);
                    return Ok(());
                }
                let result = self.load_page(path).and_then(|page| {
                    match existing {
                        Some(url) => self.store.replace(&url, page, &mut self.snippets)?,
                        None => self.store.add(page, &mut self.snippets)?,
                    }
                    Ok(())
                });
                if result.is_err() {
                    self.deferred.insert(path.clone());
                } else {
                    self.deferred.remove(path);
                }
                result
            }
        }
    }

    /// A page script appeared or vanished: refresh its page's route.
    fn refresh_script_owner(&mut self, script: &Path) {
        let owner = script.with_extension("html");
        let Some(url) = self.store.find_by_input(&owner).map(|p| p.url().to_owned()) else {
            return;
        };
        let Ok(route) = self.resolver.resolve(&owner) else {
            return;
        };
        if let Some(page) = self.store.pages_mut().iter_mut().find(|p| p.url() == url) {
            if route.script_output.is_none()
                && let Some(old) = &page.route.script_output
            {
                remove_output(&output_file(&self.config.build.output, old));
            }
            page.route = route;
        }
    }

    fn copy_image(&self, event: &QueuedEvent) -> Result<bool> {
        if event.kind == FileEvent::Unlink || !event.path.is_file() {
            return Ok(false);
        }
        copy_asset(&event.path, &self.config)
    }

    fn remove_outputs(&self, page: &Page) {
        let output = &self.config.build.output;
        let targets = std::iter::once(&page.route.output_path).chain(&page.route.script_output);
        for target in targets {
            remove_output(&output_file(output, target));
        }
    }
}

/// Delete a stale output file. Already missing is fine.
fn remove_output(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        log!("warn"; "failed to remove {}: {e}", path.display());
    }
}

/// First error of a batch, logging the others.
fn first_error(errors: Vec<anyhow::Error>) -> Result<()> {
    let mut errors = errors.into_iter();
    let Some(first) = errors.next() else {
        return Ok(());
    };
    for rest in errors {
        log!("error"; "{rest:#}");
    }
    Err(first)
}
