//! Search gateway.
//!
//! The one capability this service needs from the search engine: execute a
//! composed query against a named collection and return hits, the total
//! count, and aggregation buckets.

mod elasticsearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::aggregation::AggregationProfile;
use crate::query::{ComposedQuery, QueryDocument, SortToken};

pub use elasticsearch::{ElasticsearchGateway, GatewaySettings, RetryPolicy};

/// Failures reported by the search engine collaborator.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection failure, timeout, or an overloaded/unavailable engine.
    #[error("search engine unavailable: {0}")]
    Unavailable(String),

    /// The engine refused the query; `detail` is its response body, verbatim.
    #[error("search engine rejected query (status {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The engine answered with something that is not a search response.
    #[error("malformed search response: {0}")]
    MalformedResponse(String),
}

/// One search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub collection: String,
    pub query: QueryDocument,
    pub aggregations: AggregationProfile,
    pub sort: Vec<SortToken>,
    pub offset: u64,
    pub limit: u64,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, composed: ComposedQuery) -> Self {
        Self {
            collection: collection.into(),
            query: composed.query,
            aggregations: composed.aggregations,
            sort: composed.sort,
            offset: 0,
            limit: 10,
        }
    }

    pub fn with_window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Same query over a different page.
    pub fn page(&self, offset: u64, limit: u64) -> Self {
        self.clone().with_window(offset, limit)
    }

    /// Render the `_search` request body.
    ///
    /// Totals are always tracked exactly so that bulk drains can rely on
    /// them past the engine's default 10,000-hit cap.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "from": self.offset,
            "size": self.limit,
            "track_total_hits": true,
        });
        if let Some(query) = self.query.to_json() {
            body["query"] = query;
        }
        if !self.aggregations.is_empty() {
            body["aggs"] = self.aggregations.to_json();
        }
        if !self.sort.is_empty() {
            body["sort"] = Value::Array(self.sort.iter().map(SortToken::to_json).collect());
        }
        body
    }
}

static NULL: Value = Value::Null;

/// A raw engine hit (`_index`, `_id`, `_source`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitRecord(Value);

impl HitRecord {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// The stored document, or `null` if the hit carries none.
    pub fn source(&self) -> &Value {
        self.0.get("_source").unwrap_or(&NULL)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("_id").and_then(Value::as_str)
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub total: u64,
    pub hits: Vec<HitRecord>,
    /// Aggregation name → engine bucket payload.
    pub aggregations: Value,
}

/// Executes composed queries against the search engine.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, GatewayError>;
}
