//! Bulk CSV download route.

use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::debug;

use crate::error::AppResult;
use crate::query::{DEFAULT_CURRENT_CLASS, QueryInput};
use crate::state::AppState;

/// Create the download router.
pub fn router() -> Router<AppState> {
    Router::new().route("/data-download", post(data_download))
}

/// Download request body, as sent by the portal front end.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub page_index: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default)]
    pub search_value: String,
    #[serde(default)]
    pub sort_value: String,
    #[serde(default)]
    pub filter_value: String,
    #[serde(default = "default_current_class")]
    pub current_class: String,
    #[serde(default)]
    pub phylogeny_filters: String,
    pub index_name: String,
    pub download_option: String,
}

fn default_current_class() -> String {
    DEFAULT_CURRENT_CLASS.to_string()
}

/// Export everything matching the request as CSV.
///
/// The client's page window is ignored: downloads always start at the
/// first match.
async fn data_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> AppResult<Response> {
    debug!(
        index = %request.index_name,
        option = %request.download_option,
        page_index = request.page_index,
        page_size = request.page_size,
        "download requested"
    );

    let input = QueryInput::parse(
        Some(request.filter_value.as_str()),
        Some(request.phylogeny_filters.as_str()),
        Some(request.sort_value.as_str()),
        Some(request.search_value.as_str()),
        &request.current_class,
    )?;

    let export = state
        .search()
        .export(&request.index_name, &input, &request.download_option)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=download.csv",
            ),
        ],
        export.body,
    )
        .into_response())
}
