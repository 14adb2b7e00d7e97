use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::v1::response::ApiResponse;

#[derive(Error, Debug)]
pub enum MnemeError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Search request failed with status {status}: {body}")]
    Search { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl MnemeError {
    /// Failures of an external model backend. These are the only errors that
    /// trigger a fallback attempt.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Llm(_) | Self::LlmUnavailable(_) | Self::LlmRateLimit { .. } | Self::Http(_)
        )
    }
}

impl IntoResponse for MnemeError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, MnemeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_backend_failure_classification() {
        assert!(MnemeError::Llm("boom".into()).is_backend_failure());
        assert!(MnemeError::LlmRateLimit { retry_after: Some(3) }.is_backend_failure());
        assert!(!MnemeError::Validation("bad".into()).is_backend_failure());
        assert!(!MnemeError::VectorIndex("down".into()).is_backend_failure());
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = MnemeError::Validation("empty messages".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = MnemeError::NotFound("memory abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let response = MnemeError::Embedding("onnx exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
