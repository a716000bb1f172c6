//! Elasticsearch `_search` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{GatewayError, HitRecord, SearchGateway, SearchRequest, SearchResponse};

/// Connection settings for the search cluster.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Base URL, e.g. `https://es.example.org:9200`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    /// Skip TLS certificate verification (self-signed cluster certificates).
    pub accept_invalid_certs: bool,
    pub retry: RetryPolicy,
}

/// Retry behaviour for [`GatewayError::Unavailable`] failures.
///
/// Rejected queries are never retried: resending the same body cannot
/// change the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// [`SearchGateway`] backed by the Elasticsearch REST API.
#[derive(Clone)]
pub struct ElasticsearchGateway {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    retry: RetryPolicy,
}

impl ElasticsearchGateway {
    /// Create a new gateway with a pooled HTTP client.
    pub fn new(settings: &GatewaySettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            retry: settings.retry,
        })
    }

    fn search_url(&self, collection: &str) -> String {
        format!(
            "{}/{}/_search",
            self.base_url,
            urlencoding::encode(collection)
        )
    }

    async fn search_once(&self, request: &SearchRequest) -> Result<SearchResponse, GatewayError> {
        let body = request.to_body();
        debug!(
            collection = %request.collection,
            offset = request.offset,
            limit = request.limit,
            body = %body,
            "executing search"
        );

        let mut call = self.client.post(self.search_url(&request.collection)).json(&body);
        if let Some(username) = &self.username {
            call = call.basic_auth(username, self.password.as_deref());
        }

        let response = call.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(classify_failure(status, text));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        parse_search_response(json)
    }
}

#[async_trait]
impl SearchGateway for ElasticsearchGateway {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, GatewayError> {
        let mut attempt = 0;
        loop {
            match self.search_once(request).await {
                Err(GatewayError::Unavailable(reason)) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        collection = %request.collection,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "search engine unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

impl std::fmt::Debug for ElasticsearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchGateway")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_decode() {
        GatewayError::MalformedResponse(e.to_string())
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

/// Map a non-success status to a gateway error.
///
/// 429 and the gateway statuses mean the cluster is overloaded or
/// restarting; anything else is the engine refusing this particular query.
fn classify_failure(status: StatusCode, body: String) -> GatewayError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => GatewayError::Unavailable(format!("HTTP {status}")),
        _ => GatewayError::Rejected {
            status: status.as_u16(),
            detail: body,
        },
    }
}

/// Extract total, hits and aggregations from a `_search` response body.
fn parse_search_response(mut json: Value) -> Result<SearchResponse, GatewayError> {
    let hits = json
        .get_mut("hits")
        .ok_or_else(|| GatewayError::MalformedResponse("missing `hits`".to_string()))?;

    // 7.x+ reports `{"value": n, "relation": "eq"}`, 6.x a bare number.
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
        _ => None,
    }
    .ok_or_else(|| GatewayError::MalformedResponse("missing `hits.total`".to_string()))?;

    let hits = match hits.get_mut("hits").map(Value::take) {
        Some(Value::Array(hits)) => hits.into_iter().map(HitRecord::new).collect(),
        _ => {
            return Err(GatewayError::MalformedResponse(
                "missing `hits.hits`".to_string(),
            ));
        }
    };

    let aggregations = json
        .get_mut("aggregations")
        .map(Value::take)
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    Ok(SearchResponse {
        total,
        hits,
        aggregations,
    })
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(url: &str) -> GatewaySettings {
        GatewaySettings {
            url: url.to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(1),
            accept_invalid_certs: false,
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn parses_modern_total() {
        let response = parse_search_response(json!({
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [{ "_id": "a" }, { "_id": "b" }]
            },
            "aggregations": { "biosamples": { "buckets": [] } }
        }))
        .unwrap();
        assert_eq!(response.total, 2);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[1].id(), Some("b"));
        assert!(response.aggregations.get("biosamples").is_some());
    }

    #[test]
    fn parses_legacy_total_and_missing_aggregations() {
        let response = parse_search_response(json!({
            "hits": { "total": 7, "hits": [] }
        }))
        .unwrap();
        assert_eq!(response.total, 7);
        assert!(response.hits.is_empty());
        assert_eq!(response.aggregations, json!({}));
    }

    #[test]
    fn rejects_responses_without_hits() {
        assert!(matches!(
            parse_search_response(json!({ "error": "nope" })),
            Err(GatewayError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_search_response(json!({ "hits": { "hits": [] } })),
            Err(GatewayError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_search_response(json!({ "hits": { "total": 1 } })),
            Err(GatewayError::MalformedResponse(_))
        ));
    }

    #[test]
    fn overloaded_cluster_is_unavailable() {
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert!(matches!(
                classify_failure(status, String::new()),
                GatewayError::Unavailable(_)
            ));
        }
    }

    #[test]
    fn bad_request_passes_detail_through() {
        let detail = r#"{"error":{"type":"query_shard_exception"}}"#.to_string();
        match classify_failure(StatusCode::BAD_REQUEST, detail.clone()) {
            GatewayError::Rejected { status, detail: d } => {
                assert_eq!(status, 400);
                assert_eq!(d, detail);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for(40), Duration::from_secs(2));
    }

    #[test]
    fn search_url_encodes_collection() {
        let gateway = ElasticsearchGateway::new(&settings("http://localhost:9200/")).unwrap();
        assert_eq!(
            gateway.search_url("data_portal"),
            "http://localhost:9200/data_portal/_search"
        );
        assert_eq!(
            gateway.search_url("a b"),
            "http://localhost:9200/a%20b/_search"
        );
    }

    #[tokio::test]
    async fn unreachable_cluster_is_unavailable() {
        // Port 9 (discard) is closed on test hosts; the connect fails fast.
        let gateway = ElasticsearchGateway::new(&settings("http://127.0.0.1:9")).unwrap();
        let request = SearchRequest::new(
            "data_portal",
            crate::query::QueryComposer::for_index("data_portal")
                .compose(&crate::query::QueryInput::default()),
        );
        let err = gateway.search(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)), "{err:?}");
    }

    /// Local cluster stand-in answering every `_search` with `status`.
    /// Returns its base URL and the number of requests it has seen.
    async fn cluster_answering(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let app = axum::Router::new().route(
            "/{collection}/_search",
            axum::routing::post(move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    (
                        axum::http::StatusCode::from_u16(status.as_u16()).unwrap(),
                        r#"{"error":"nope"}"#,
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), attempts)
    }

    async fn search_with_retries(status: StatusCode) -> (GatewayError, usize) {
        let (url, attempts) = cluster_answering(status).await;
        let mut settings = settings(&url);
        settings.retry = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let gateway = ElasticsearchGateway::new(&settings).unwrap();
        let request = SearchRequest::new(
            "data_portal",
            crate::query::QueryComposer::for_index("data_portal")
                .compose(&crate::query::QueryInput::default()),
        );
        let err = gateway.search(&request).await.unwrap_err();
        (err, attempts.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn unavailable_cluster_is_retried_until_budget_runs_out() {
        let (err, attempts) = search_with_retries(StatusCode::SERVICE_UNAVAILABLE).await;
        assert!(matches!(err, GatewayError::Unavailable(_)), "{err:?}");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn throttled_cluster_is_retried() {
        let (err, attempts) = search_with_retries(StatusCode::TOO_MANY_REQUESTS).await;
        assert!(matches!(err, GatewayError::Unavailable(_)), "{err:?}");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn rejected_query_is_not_retried() {
        let (err, attempts) = search_with_retries(StatusCode::BAD_REQUEST).await;
        match err {
            GatewayError::Rejected { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, r#"{"error":"nope"}"#);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(attempts, 1);
    }
}
