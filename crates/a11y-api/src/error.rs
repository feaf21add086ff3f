//! HTTP error mapping

use crate::db::StoreError;
use crate::recommend::ProviderError;
use crate::workers::CoordinatorError;
use a11y_core::CoreError;
use a11y_tools::ToolError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Scan not found")]
    NotFound,

    #[error("Scan not completed yet")]
    NotReady,

    #[error("Scan failed to complete")]
    ScanFailed,

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Scan initialization failed: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Report generation failed: {0}")]
    Report(#[from] CoreError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            // 425 Too Early: the client should poll again
            ApiError::NotReady => StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT),
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ScanFailed
            | ApiError::Store(_)
            | ApiError::Coordinator(_)
            | ApiError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Failures while wiring up the server
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Scanner misconfigured: {0}")]
    Tool(#[from] ToolError),

    #[error("Recommendation provider misconfigured: {0}")]
    Provider(#[from] ProviderError),
}
