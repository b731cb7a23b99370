//! Error types for memestash-ingest
//!
//! - `ApiError`: HTTP-facing errors with JSON bodies
//! - `PipelineError`: run-level failures returned by pipeline entry points
//! - `IngestError`: per-item failures, caught and counted inside a run

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::FetchError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - a pipeline run is already active
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// memestash-common error
    #[error("Common error: {0}")]
    Common(#[from] memestash_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Run-level pipeline failure
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another run holds the progress tracker
    #[error("A run is already in progress: {task}")]
    Busy { task: String },

    /// Run aborted before processing items (prompt, list file, or store unavailable)
    #[error("Run setup failed: {0}")]
    Setup(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Busy { .. } => ApiError::Conflict(err.to_string()),
            PipelineError::Setup(_) => ApiError::Internal(err.to_string()),
        }
    }
}

/// Failure of a single item inside a run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Filesystem error: {0}")]
    Filesystem(std::io::Error),

    #[error("Store error: {0}")]
    Store(memestash_common::Error),
}

impl From<memestash_common::Error> for IngestError {
    fn from(err: memestash_common::Error) -> Self {
        match err {
            memestash_common::Error::Io(e) => IngestError::Filesystem(e),
            other => IngestError::Store(other),
        }
    }
}
