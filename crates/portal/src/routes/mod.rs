//! HTTP route handlers.

pub mod download;
pub mod search;

use axum::Router;

use crate::state::AppState;

/// All service routes, without middleware layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(download::router())
        .merge(search::router())
}
