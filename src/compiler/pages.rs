//! Two-phase page rendering.
//!
//! ```text
//! Phase 1 (content):  body ──render_inline(ctx)──► compiled_body   (every page)
//!                                  │
//!                   manifest + bundles run here, reading compiled bodies
//!                                  │
//! Phase 2 (layout):   layout ──render_layout(ctx + content)──► html
//! ```
//!
//! Phase 1 finishes for every page before phase 2 starts for any, because the
//! route manifest embeds compiled bodies and is built in between. Within a
//! phase pages render one at a time, in store order.

use crate::compiler::template::{RenderContext, TemplateEngine};
use crate::config::SiteSection;
use crate::data::PageData;
use crate::error::BuildError;
use crate::log;
use crate::logger::ProgressBars;
use crate::page::Page;
use crate::snippet::SnippetRegistry;
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Rendered html for one page, not yet written.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Url path of the html file, e.g. `/about/index.html`
    pub output_path: String,
    pub html: String,
}

pub struct RenderPipeline<'a> {
    engine: &'a dyn TemplateEngine,
    shared: &'a RenderContext,
    site: &'a SiteSection,
    default_layout: &'a str,
}

impl<'a> RenderPipeline<'a> {
    pub fn new(
        engine: &'a dyn TemplateEngine,
        shared: &'a RenderContext,
        site: &'a SiteSection,
        default_layout: &'a str,
    ) -> Self {
        Self {
            engine,
            shared,
            site,
            default_layout,
        }
    }

    fn layout_of<'p>(&self, page: &'p Page) -> &'p str
    where
        'a: 'p,
    {
        page.layout().unwrap_or(self.default_layout)
    }

    /// Build one render context per page, in store order.
    ///
    /// Snippets are looked up here, once per page per pass, so an unknown key
    /// yields a single diagnostic even though both phases read the context.
    /// Names read from `snippets` in the body or layout count as references
    /// even when the front matter does not declare them.
    pub fn prepare(&self, pages: &[Page], snippets: &mut SnippetRegistry) -> Vec<RenderContext> {
        let listing: Vec<PageData> = pages.iter().map(PageData::from).collect();
        let listing = serde_json::to_value(listing).unwrap_or(Value::Array(Vec::new()));
        let mut layouts: FxHashMap<&str, String> = FxHashMap::default();

        pages
            .iter()
            .map(|page| {
                let mut context = self.shared.clone();
                context.insert("pages".into(), listing.clone());
                for (key, value) in &page.front_matter {
                    context.insert(key.clone(), value.clone());
                }
                self.insert_route(&mut context, page);

                let layout = layouts
                    .entry(self.layout_of(page))
                    .or_insert_with_key(|name| self.engine.layout_source(name).unwrap_or_default());
                let sources = [page.body.as_str(), layout.as_str()];
                let snippet_map =
                    snippets.context_for(&page.snippet_refs(), &sources, &page.input_path);
                context.insert("snippets".into(), Value::Object(snippet_map));
                context
            })
            .collect()
    }

    fn insert_route(&self, context: &mut RenderContext, page: &Page) {
        let route = &page.route;
        context.insert("url".into(), route.url.clone().into());
        context.insert("slug".into(), route.slug.clone().into());
        context.insert("id".into(), route.id.clone().into());
        context.insert("output_path".into(), route.output_path.clone().into());
        context.insert(
            "script_path".into(),
            route.script_output.clone().map_or(Value::Null, Value::String),
        );
        context.insert("page_title".into(), full_title(page, self.site).into());
    }

    /// Phase 1: render every page body against its context.
    ///
    /// All pages are attempted; the first failure in store order is returned
    /// and the rest are logged.
    pub fn compile_pages(
        &self,
        pages: &mut [Page],
        contexts: &[RenderContext],
    ) -> Result<(), BuildError> {
        let progress = ProgressBars::new(&[("content", pages.len())]);
        let mut errors = Vec::new();

        for (page, context) in pages.iter_mut().zip(contexts) {
            match self.engine.render_inline(&page.body, context) {
                Ok(html) => page.compiled_body = Some(html),
                Err(e) => {
                    page.compiled_body = None;
                    errors.push(BuildError::Render {
                        phase: "content",
                        page: page.input_path.clone(),
                        message: format!("{e:#}"),
                    });
                }
            }
            progress.inc_by_name("content");
        }
        progress.finish();

        first_error(errors)
    }

    /// Phase 2: wrap each compiled body in its layout.
    pub fn render_layouts(
        &self,
        pages: &[Page],
        contexts: &[RenderContext],
    ) -> Result<Vec<RenderedPage>, BuildError> {
        for page in pages {
            let layout = self.layout_of(page);
            if !self.engine.has_layout(layout) {
                return Err(BuildError::MissingLayout {
                    layout: layout.to_owned(),
                    page: page.input_path.clone(),
                });
            }
        }

        let progress = ProgressBars::new(&[("layout", pages.len())]);
        let mut rendered = Vec::with_capacity(pages.len());
        let mut errors = Vec::new();
        for (page, context) in pages.iter().zip(contexts) {
            match self.render_layout(page, context) {
                Ok(page) => rendered.push(page),
                Err(e) => errors.push(e),
            }
            progress.inc_by_name("layout");
        }
        progress.finish();

        first_error(errors)?;
        Ok(rendered)
    }

    fn render_layout(&self, page: &Page, context: &RenderContext) -> Result<RenderedPage, BuildError> {
        let mut context = context.clone();
        context.insert(
            "content".into(),
            page.compiled_body.clone().unwrap_or_default().into(),
        );

        let html = self
            .engine
            .render_layout(self.layout_of(page), &context)
            .map_err(|e| BuildError::Render {
                phase: "layout",
                page: page.input_path.clone(),
                message: format!("{e:#}"),
            })?;

        Ok(RenderedPage {
            output_path: page.route.output_path.clone(),
            html,
        })
    }
}

/// Page title with the site suffix, falling back to the site title.
pub fn full_title(page: &Page, site: &SiteSection) -> String {
    let title = page.title().unwrap_or(&site.title);
    format!("{title}{}", site.title_suffix)
}

fn first_error(errors: Vec<BuildError>) -> Result<(), BuildError> {
    let mut errors = errors.into_iter();
    let Some(first) = errors.next() else {
        return Ok(());
    };
    for rest in errors {
        log!("error"; "{rest}");
    }
    Err(first)
}
