//! Pagination drainer.
//!
//! Pulls every hit matching a search request by issuing sequential page
//! fetches until the reported total has been accumulated.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::gateway::{GatewayError, HitRecord, SearchGateway, SearchRequest};

/// Default page-size ceiling per fetch.
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;

/// Default upper bound on fetches per drain.
pub const DEFAULT_MAX_PAGES: u32 = 100;

#[derive(Debug, Error)]
pub enum DrainError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("drain stopped after {pages} page(s) with {fetched} of {expected} hits")]
    Incomplete {
        fetched: u64,
        expected: u64,
        pages: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    pub page_size: u64,
    pub max_pages: u32,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl DrainSettings {
    pub fn new(page_size: u64, max_pages: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }
}

/// Everything a drain collected.
#[derive(Debug, Clone, Default)]
pub struct DrainedResults {
    /// Total reported by the first page.
    pub total: u64,
    pub hits: Vec<HitRecord>,
    /// Aggregations of the first page.
    pub aggregations: Value,
    /// Number of fetches issued.
    pub pages: u32,
}

pub struct PaginationDrainer<'a> {
    gateway: &'a dyn SearchGateway,
    settings: DrainSettings,
}

impl<'a> PaginationDrainer<'a> {
    pub fn new(gateway: &'a dyn SearchGateway, settings: DrainSettings) -> Self {
        Self { gateway, settings }
    }

    /// Fetch every hit of `request` from its offset onwards.
    ///
    /// The request's own `limit` is replaced by the page-size ceiling. Any
    /// failed fetch aborts the drain and nothing is returned.
    pub async fn drain(&self, request: &SearchRequest) -> Result<DrainedResults, DrainError> {
        let start = request.offset;
        let page_size = self.settings.page_size;

        let first = self.gateway.search(&request.page(start, page_size)).await?;
        let expected = first.total.saturating_sub(start);
        let mut drained = DrainedResults {
            total: first.total,
            hits: first.hits,
            aggregations: first.aggregations,
            pages: 1,
        };
        debug!(
            collection = %request.collection,
            total = drained.total,
            fetched = drained.hits.len(),
            "fetched first page"
        );

        while (drained.hits.len() as u64) < expected {
            let fetched = drained.hits.len() as u64;
            if drained.pages >= self.settings.max_pages {
                return Err(DrainError::Incomplete {
                    fetched,
                    expected,
                    pages: drained.pages,
                });
            }

            let offset = start + page_size * u64::from(drained.pages);
            let page = self.gateway.search(&request.page(offset, page_size)).await?;
            drained.pages += 1;
            debug!(
                collection = %request.collection,
                offset,
                fetched = page.hits.len(),
                "fetched page"
            );

            if page.hits.is_empty() {
                return Err(DrainError::Incomplete {
                    fetched,
                    expected,
                    pages: drained.pages,
                });
            }
            drained.hits.extend(page.hits);
        }

        info!(
            collection = %request.collection,
            hits = drained.hits.len(),
            pages = drained.pages,
            "drain complete"
        );
        Ok(drained)
    }
}
