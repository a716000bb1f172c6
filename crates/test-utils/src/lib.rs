//! Portal test utilities.
//!
//! Helpers for integration testing: hit fixtures and an in-memory search
//! gateway that serves canned pages and records every request it receives.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};

use portal_api::gateway::{GatewayError, HitRecord, SearchGateway, SearchRequest, SearchResponse};

/// Create a test hit with an empty `_source`.
pub fn test_hit(id: &str) -> TestHit {
    TestHit {
        index: "data_portal".to_string(),
        id: id.to_string(),
        source: json!({}),
    }
}

/// Create a data-portal organism hit.
pub fn organism_hit(organism: &str) -> TestHit {
    test_hit(organism).with_field("organism", json!(organism))
}

/// A test hit builder for creating engine fixtures.
#[derive(Debug, Clone)]
pub struct TestHit {
    pub index: String,
    pub id: String,
    pub source: JsonValue,
}

impl TestHit {
    /// Set the collection the hit claims to come from.
    pub fn in_index(mut self, index: &str) -> Self {
        self.index = index.to_string();
        self
    }

    /// Add a single `_source` field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        if let Some(obj) = self.source.as_object_mut() {
            obj.insert(name.to_string(), value);
        }
        self
    }

    /// Append one element to an array field (`experiment`, `assemblies`, ...).
    pub fn with_element(mut self, name: &str, element: JsonValue) -> Self {
        if let Some(obj) = self.source.as_object_mut() {
            let slot = obj.entry(name.to_string()).or_insert_with(|| json!([]));
            if let Some(items) = slot.as_array_mut() {
                items.push(element);
            }
        }
        self
    }

    pub fn build(self) -> HitRecord {
        HitRecord::new(json!({
            "_index": self.index,
            "_id": self.id,
            "_score": 1.0,
            "_source": self.source,
        }))
    }
}

/// `count` numbered organism hits (`Organism 0`, `Organism 1`, ...).
pub fn numbered_hits(count: usize) -> Vec<HitRecord> {
    (0..count)
        .map(|n| organism_hit(&format!("Organism {n}")).build())
        .collect()
}

/// In-memory [`SearchGateway`].
///
/// Queries are not evaluated: every request is served a window of the same
/// hit list, so tests assert on the recorded requests instead.
#[derive(Default)]
pub struct StaticGateway {
    hits: Vec<HitRecord>,
    aggregations: Option<JsonValue>,
    reported_total: Option<u64>,
    failure: Option<(u64, GatewayError)>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl StaticGateway {
    pub fn new(hits: Vec<HitRecord>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    /// Aggregation payload returned with every page.
    pub fn with_aggregations(mut self, aggregations: JsonValue) -> Self {
        self.aggregations = Some(aggregations);
        self
    }

    /// Report a total different from the number of hits actually served.
    pub fn with_reported_total(mut self, total: u64) -> Self {
        self.reported_total = Some(total);
        self
    }

    /// Fail every request whose window starts at `offset`.
    pub fn failing_at(mut self, offset: u64, error: GatewayError) -> Self {
        self.failure = Some((offset, error));
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().clone()
    }

    /// Rendered `_search` bodies received so far, in order.
    pub fn bodies(&self) -> Vec<JsonValue> {
        self.requests.lock().iter().map(SearchRequest::to_body).collect()
    }
}

#[async_trait]
impl SearchGateway for StaticGateway {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, GatewayError> {
        self.requests.lock().push(request.clone());

        if let Some((offset, error)) = &self.failure
            && *offset == request.offset
        {
            return Err(error.clone());
        }

        let start = usize::try_from(request.offset)
            .unwrap_or(usize::MAX)
            .min(self.hits.len());
        let end = usize::try_from(request.offset.saturating_add(request.limit))
            .unwrap_or(usize::MAX)
            .min(self.hits.len());

        Ok(SearchResponse {
            total: self.reported_total.unwrap_or(self.hits.len() as u64),
            hits: self.hits[start..end].to_vec(),
            aggregations: self.aggregations.clone().unwrap_or_else(|| json!({})),
        })
    }
}
