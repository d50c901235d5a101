//! Error types for the HTTP API

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dhukuti_core::CircleError;
use serde::Serialize;
use thiserror::Error;

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input failed validation
    #[error("{0}")]
    Validation(String),

    /// Malformed path or body
    #[error("{0}")]
    BadRequest(String),

    /// No caller identity
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks the role for the action
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Duplicate resource
    #[error("{0}")]
    Conflict(String),

    /// Storage failure; the transaction was rolled back
    #[error("a storage error occurred, please retry")]
    Database(String),

    /// Anything else
    #[error("an internal error occurred")]
    Internal(String),
}

impl ApiError {
    /// Status code and machine-readable code for this error.
    #[must_use]
    pub const fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl From<CircleError> for ApiError {
    fn from(err: CircleError) -> Self {
        if err.is_store_failure() {
            return Self::Database(err.to_string());
        }
        match err {
            CircleError::Validation(msg) => Self::Validation(msg),
            CircleError::Forbidden(msg) => Self::Forbidden(msg),
            CircleError::NotFound(msg) => Self::NotFound(msg),
            CircleError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            Self::Database(detail) | Self::Internal(detail) => {
                tracing::error!(code, error = %detail, "Request failed");
            }
            _ => tracing::debug!(code, error = %self, "Request rejected"),
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
