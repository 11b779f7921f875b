//! Ordered collection of the site's pages.
//!
//! Insertion order is discovery order and drives the route manifest order.
//! Url and slug uniqueness are enforced here; adding or replacing a page also
//! registers its snippet keys.

use super::Page;
use crate::error::BuildError;
use crate::snippet::SnippetRegistry;
use std::path::Path;

#[derive(Debug, Default)]
pub struct PageStore {
    pages: Vec<Page>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.pages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn find(&self, url: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.url() == url)
    }

    pub fn find_by_input(&self, input: &Path) -> Option<&Page> {
        self.pages.iter().find(|p| p.input_path == input)
    }

    /// Append a page.
    ///
    /// # Errors
    /// Fails when another page already owns the url or the slug.
    pub fn add(&mut self, page: Page, snippets: &mut SnippetRegistry) -> Result<(), BuildError> {
        self.check_unique(&page, None)?;
        snippets.register_refs(&page.snippet_refs());
        self.pages.push(page);
        Ok(())
    }

    /// Swap the page at `url` for `page`, keeping its position.
    ///
    /// A missing `url` appends instead, so a change event for a page that was
    /// never added still lands in the store.
    pub fn replace(
        &mut self,
        url: &str,
        page: Page,
        snippets: &mut SnippetRegistry,
    ) -> Result<(), BuildError> {
        let Some(index) = self.pages.iter().position(|p| p.url() == url) else {
            return self.add(page, snippets);
        };

        self.check_unique(&page, Some(index))?;
        snippets.register_refs(&page.snippet_refs());
        self.pages[index] = page;
        Ok(())
    }

    /// Remove and return the page at `url`. A missing url is a no-op.
    pub fn remove(&mut self, url: &str) -> Option<Page> {
        let index = self.pages.iter().position(|p| p.url() == url)?;
        Some(self.pages.remove(index))
    }

    fn check_unique(&self, page: &Page, skip: Option<usize>) -> Result<(), BuildError> {
        let others = self
            .pages
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, p)| p);

        for existing in others {
            if existing.url() == page.url() {
                return Err(BuildError::DuplicateRoute {
                    url: page.url().to_owned(),
                    existing: existing.input_path.clone(),
                    incoming: page.input_path.clone(),
                });
            }
            if existing.slug() == page.slug() {
                return Err(BuildError::SlugCollision {
                    slug: page.slug().to_owned(),
                    existing: existing.input_path.clone(),
                    incoming: page.input_path.clone(),
                });
            }
            // Distinct slugs can still camel-case to one component name
            if existing.route.id == page.route.id {
                return Err(BuildError::IdCollision {
                    id: page.route.id.clone(),
                    existing: existing.input_path.clone(),
                    incoming: page.input_path.clone(),
                });
            }
        }
        Ok(())
    }
}
