//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use catalog_core::CatalogError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failure reading the current snapshot.
    #[error("{0}")]
    Query(CatalogError),

    /// Failure of a manually triggered refresh.
    #[error("{0}")]
    Refresh(CatalogError),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("missing or invalid bearer token")]
    Unauthorized,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(CatalogError::Unavailable | CatalogError::BackingStore(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Query(_) | Self::Refresh(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::debug!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
