#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] drives the REAL router and search service; only the search
//! engine is replaced by the in-memory gateway from `portal-test-utils`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use portal_api::AppState;
use portal_api::drain::DrainSettings;
use portal_test_utils::StaticGateway;

/// Test application wrapper using the real routes and state.
pub struct TestApp {
    router: Router,
    pub gateway: Arc<StaticGateway>,
}

impl TestApp {
    /// Build an app over `gateway` with the default drain settings.
    pub fn new(gateway: StaticGateway) -> Self {
        Self::with_drain(gateway, DrainSettings::default())
    }

    pub fn with_drain(gateway: StaticGateway, drain: DrainSettings) -> Self {
        let gateway = Arc::new(gateway);
        let state = AppState::from_gateway(gateway.clone(), drain);

        // Must match main.rs, minus CORS.
        let router = portal_api::routes::router()
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .with_state(state);

        Self { router, gateway }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.request(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

/// Read a response body as a string.
pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Response body was not UTF-8")
}

/// Read a response body as JSON, asserting the status first.
pub async fn json_body(response: Response, expected: StatusCode) -> serde_json::Value {
    let status = response.status();
    let body = body_string(response).await;
    assert_eq!(status, expected, "unexpected status, body: {body}");
    serde_json::from_str(&body).expect("Response body was not JSON")
}
