use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::db::ResultSet;
use crate::error::GatewayError;

/// Body of a successful `/table` or `/query` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    /// Rows returned by the database, before the preview cap.
    pub rows_count: usize,
    pub rows_preview: Vec<Vec<serde_json::Value>>,
}

impl QueryResponse {
    /// Builds a response whose preview holds at most `preview_rows` rows.
    pub fn from_result(result: &ResultSet, preview_rows: usize) -> Self {
        Self {
            columns: result.column_names(),
            rows_count: result.row_count(),
            rows_preview: result
                .rows
                .iter()
                .take(preview_rows)
                .map(|row| row.iter().map(|v| v.to_json()).collect())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

pub fn json_error(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Status code for a gateway error.
pub fn status_for(error: &GatewayError) -> StatusCode {
    match error {
        GatewayError::Rejected(_) => StatusCode::BAD_REQUEST,
        GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
        GatewayError::AccessDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wrapper that renders a [`GatewayError`] as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(category = self.0.category(), error = %self.0, "Request failed");
        }
        json_error(status, self.0.to_string())
    }
}
