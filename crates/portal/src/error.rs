//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::drain::DrainError;
use crate::export::ExportError;
use crate::gateway::GatewayError;
use crate::query::GrammarError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed filter/sort/phylogeny input or an impossible export request.
    #[error("invalid query input: {0}")]
    InvalidQueryInput(String),

    #[error("search engine unavailable: {0}")]
    SearchUnavailable(String),

    /// The engine refused the query; the detail is its body, verbatim.
    #[error("{detail}")]
    SearchQueryRejected { status: u16, detail: String },

    #[error("{0}")]
    DrainIncomplete(String),

    #[error("not found")]
    NotFound,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<GrammarError> for AppError {
    fn from(e: GrammarError) -> Self {
        AppError::InvalidQueryInput(e.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(reason) => AppError::SearchUnavailable(reason),
            GatewayError::Rejected { status, detail } => {
                AppError::SearchQueryRejected { status, detail }
            }
            GatewayError::MalformedResponse(reason) => {
                AppError::Internal(anyhow::anyhow!("malformed search response: {reason}"))
            }
        }
    }
}

impl From<DrainError> for AppError {
    fn from(e: DrainError) -> Self {
        match e {
            DrainError::Gateway(e) => e.into(),
            incomplete @ DrainError::Incomplete { .. } => {
                AppError::DrainIncomplete(incomplete.to_string())
            }
        }
    }
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        if e.is_client_error() {
            AppError::InvalidQueryInput(e.to_string())
        } else {
            AppError::Internal(anyhow::Error::new(e).context("CSV export failed"))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidQueryInput(_) => StatusCode::BAD_REQUEST,
            AppError::SearchUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SearchQueryRejected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DrainIncomplete(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::InvalidQueryInput(reason) => {
                tracing::warn!(reason = %reason, "rejected query input");
                self.to_string()
            }
            AppError::SearchUnavailable(reason) => {
                tracing::error!(reason = %reason, "search engine unavailable");
                self.to_string()
            }
            AppError::SearchQueryRejected { status, detail } => {
                tracing::error!(status, detail = %detail, "search engine rejected query");
                detail.clone()
            }
            AppError::DrainIncomplete(reason) => {
                tracing::error!(reason = %reason, "bulk drain incomplete");
                self.to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal server error");
                "internal server error".to_string()
            }
            AppError::NotFound => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                AppError::from(GrammarError::MalformedFilterToken("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(GatewayError::Unavailable("timeout".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(GatewayError::Rejected {
                    status: 400,
                    detail: "bad".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(DrainError::Incomplete {
                    fetched: 1,
                    expected: 2,
                    pages: 1,
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(ExportError::UnknownDownloadOption("fasta".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(GatewayError::MalformedResponse("no hits".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn drained_gateway_errors_keep_their_kind() {
        let error = AppError::from(DrainError::Gateway(GatewayError::Unavailable("reset".into())));
        assert!(matches!(error, AppError::SearchUnavailable(_)));
    }

    #[test]
    fn rejection_detail_is_verbatim() {
        let error = AppError::from(GatewayError::Rejected {
            status: 400,
            detail: r#"{"error":"parse"}"#.into(),
        });
        assert_eq!(error.to_string(), r#"{"error":"parse"}"#);
    }
}
