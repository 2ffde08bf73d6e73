use tracing::debug;

use crate::catalog::{CatalogService, SearchQuery};
use crate::error::PipelineError;
use crate::models::RawTrack;
use crate::settings::EmptyPagePolicy;

/// Offsets and limits for a fixed total result budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    pub page_size: usize,
    pub total: usize,
}

impl PagePlan {
    pub fn request_count(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }

    /// `(offset, limit)` for a page; the last page is clamped to the remaining budget.
    pub fn page(&self, page_index: usize) -> Option<(usize, usize)> {
        let offset = page_index * self.page_size;
        if offset >= self.total {
            return None;
        }
        Some((offset, self.page_size.min(self.total - offset)))
    }
}

pub struct FetchedPage {
    pub offset: usize,
    pub items: Vec<RawTrack>,
}

/// Lazy sequence of search pages. Each `next()` issues exactly one request.
///
/// Stops after the budget is spent, after an error, or (with
/// `EmptyPagePolicy::Stop`) after the first empty page.
pub struct PageFetcher<'a, C: CatalogService + ?Sized> {
    service: &'a C,
    query: &'a SearchQuery,
    plan: PagePlan,
    policy: EmptyPagePolicy,
    next_page: usize,
    done: bool,
}

impl<'a, C: CatalogService + ?Sized> PageFetcher<'a, C> {
    pub fn new(service: &'a C, query: &'a SearchQuery, plan: PagePlan, policy: EmptyPagePolicy) -> Self {
        PageFetcher {
            service,
            query,
            plan,
            policy,
            next_page: 0,
            done: false,
        }
    }
}

impl<C: CatalogService + ?Sized> Iterator for PageFetcher<'_, C> {
    type Item = Result<FetchedPage, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some((offset, limit)) = self.plan.page(self.next_page) else {
            self.done = true;
            return None;
        };
        self.next_page += 1;

        match self.service.search(self.query, limit, offset) {
            Ok(page) => {
                debug!(offset, limit, items = page.items.len(), "Fetched search page");
                if page.items.is_empty() && self.policy == EmptyPagePolicy::Stop {
                    self.done = true;
                }
                Some(Ok(FetchedPage {
                    offset,
                    items: page.items,
                }))
            }
            Err(source) => {
                self.done = true;
                Some(Err(PipelineError::Search { offset, source }))
            }
        }
    }
}
