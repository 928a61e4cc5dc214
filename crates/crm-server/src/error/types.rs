//! API error types.

use axum::http::StatusCode;
use std::collections::HashMap;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors a handler can return to the client.
///
/// Cache failures are deliberately absent: they are absorbed by the cache
/// middlewares and never reach this type.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    ValidationError(HashMap<String, Vec<String>>),

    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),

    // 404 Not Found
    #[error("Resource not found")]
    ResourceNotFound { resource: String, id: String },

    // 500 Internal Server Error
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) | Self::InvalidQueryParam(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidQueryParam(_) => "invalid_query_param",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Check if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Create a not found error for a specific record.
pub fn not_found(resource: &str, id: impl ToString) -> ApiError {
    ApiError::ResourceNotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}
