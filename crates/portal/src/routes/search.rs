//! Listing and record-detail routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::query::{DEFAULT_CURRENT_CLASS, QueryInput};
use crate::search::{RecordDetail, SearchResults};
use crate::state::AppState;

/// Create the search router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favicon.ico", get(favicon))
        .route("/{index}", get(list))
        .route("/{index}/{record_id}", get(record))
}

/// Listing query parameters.
///
/// Multi-value parameters arrive flattened into single strings and are
/// parsed by the query grammar.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub sort: Option<String>,
    pub filter: Option<String>,
    pub search: Option<String>,
    #[serde(default = "default_current_class")]
    pub current_class: String,
    pub phylogeny_filters: Option<String>,
    pub action: Option<String>,
}

fn default_limit() -> u64 {
    15
}

fn default_current_class() -> String {
    DEFAULT_CURRENT_CLASS.to_string()
}

impl ListParams {
    pub fn query_input(&self) -> AppResult<QueryInput> {
        Ok(QueryInput::parse(
            self.filter.as_deref(),
            self.phylogeny_filters.as_deref(),
            self.sort.as_deref(),
            self.search.as_deref(),
            &self.current_class,
        )?)
    }

    /// `action=download` asks for every match instead of one page.
    pub fn wants_everything(&self) -> bool {
        self.action.as_deref() == Some("download")
    }
}

async fn favicon() -> AppResult<()> {
    Err(AppError::NotFound)
}

/// Page of matches, or all of them with `action=download`.
async fn list(
    State(state): State<AppState>,
    Path(index): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<SearchResults>> {
    let input = params.query_input()?;
    let results = if params.wants_everything() {
        state.search().drain(&index, &input, params.offset).await?
    } else {
        state
            .search()
            .list(&index, &input, params.offset, params.limit)
            .await?
    };
    Ok(Json(results))
}

async fn record(
    State(state): State<AppState>,
    Path((index, record_id)): Path<(String, String)>,
) -> AppResult<Json<RecordDetail>> {
    Ok(Json(state.search().record(&index, &record_id).await?))
}
