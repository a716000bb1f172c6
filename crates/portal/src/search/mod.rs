//! Search service.
//!
//! Glues the query composer, the search gateway, the pagination drainer and
//! the CSV projector together for the HTTP layer.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::IndexDomain;
use crate::drain::{DrainSettings, PaginationDrainer};
use crate::error::AppResult;
use crate::export::{self, DownloadOption, ExportLayout};
use crate::gateway::{HitRecord, SearchGateway, SearchRequest};
use crate::query::{QueryComposer, QueryInput};

/// Hits, total and aggregation buckets of one listing.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// Total number of matches reported by the engine.
    pub count: u64,
    pub results: Vec<HitRecord>,
    pub aggregations: Value,
}

/// One record plus, for portal records, its per-record filter buckets.
#[derive(Debug, Clone, Serialize)]
pub struct RecordDetail {
    pub count: u64,
    pub results: Vec<HitRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

/// A rendered CSV export.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub body: Vec<u8>,
    pub rows: usize,
}

/// Search service for portal collections.
#[derive(Clone)]
pub struct SearchService {
    gateway: Arc<dyn SearchGateway>,
    drain: DrainSettings,
}

impl SearchService {
    /// Create a new search service.
    pub fn new(gateway: Arc<dyn SearchGateway>, drain: DrainSettings) -> Self {
        Self { gateway, drain }
    }

    fn request(index: &str, input: &QueryInput) -> SearchRequest {
        let composed = QueryComposer::for_index(index).compose(input);
        SearchRequest::new(index, composed)
    }

    /// One page of matches with aggregations.
    pub async fn list(
        &self,
        index: &str,
        input: &QueryInput,
        offset: u64,
        limit: u64,
    ) -> AppResult<SearchResults> {
        let request = Self::request(index, input).with_window(offset, limit);
        let response = self.gateway.search(&request).await?;
        debug!(
            index,
            total = response.total,
            returned = response.hits.len(),
            "listing served"
        );
        Ok(SearchResults {
            count: response.total,
            results: response.hits,
            aggregations: response.aggregations,
        })
    }

    /// Every match from `offset` onwards.
    pub async fn drain(
        &self,
        index: &str,
        input: &QueryInput,
        offset: u64,
    ) -> AppResult<SearchResults> {
        let request = Self::request(index, input).with_window(offset, self.drain.page_size);
        let drained = PaginationDrainer::new(self.gateway.as_ref(), self.drain)
            .drain(&request)
            .await?;
        Ok(SearchResults {
            count: drained.total,
            results: drained.hits,
            aggregations: drained.aggregations,
        })
    }

    /// Look up a single record.
    pub async fn record(&self, index: &str, record_id: &str) -> AppResult<RecordDetail> {
        let composer = QueryComposer::for_index(index);
        let request = SearchRequest::new(index, composer.compose_detail(record_id));
        let response = self.gateway.search(&request).await?;

        let aggregations = match composer.domain() {
            IndexDomain::DataPortal => Some(response.aggregations),
            _ => None,
        };
        Ok(RecordDetail {
            count: response.total,
            results: response.hits,
            aggregations,
        })
    }

    /// Drain all matches and render them as CSV.
    ///
    /// The download option is validated before any search is issued.
    pub async fn export(
        &self,
        index: &str,
        input: &QueryInput,
        download_option: &str,
    ) -> AppResult<CsvExport> {
        let option: DownloadOption = download_option.parse()?;
        let layout = ExportLayout::resolve(option, IndexDomain::from_index(index))?;

        let drained = self.drain(index, input, 0).await?;
        let mut body = Vec::new();
        let rows = export::write_csv(layout, &drained.results, &mut body)?;
        info!(
            index,
            option = %option,
            hits = drained.results.len(),
            rows,
            "export rendered"
        );
        Ok(CsvExport { body, rows })
    }
}
