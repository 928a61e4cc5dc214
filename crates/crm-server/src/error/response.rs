//! Error response implementation.

use super::types::ApiError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<HashMap<String, Vec<String>>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            error!(error = %self, code = self.error_code(), "Server error occurred");
        }

        let status = self.status_code();
        let code = self.error_code();

        let (message, details, fields) = match &self {
            ApiError::ValidationError(field_errors) => {
                (self.to_string(), None, Some(field_errors.clone()))
            }
            ApiError::ResourceNotFound { resource, id } => {
                let details = serde_json::json!({
                    "resource": resource,
                    "id": id
                });
                (self.to_string(), Some(details), None)
            }
            ApiError::Internal(err) => {
                // Internal details stay out of release builds.
                let message = if cfg!(debug_assertions) {
                    format!("{}: {}", self, err)
                } else {
                    "An internal error occurred".to_string()
                };
                (message, None, None)
            }
            _ => (self.to_string(), None, None),
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code,
                message,
                details,
                fields,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::not_found;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = not_found("orders", "abc").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "resource_not_found");
        assert_eq!(body["error"]["details"]["resource"], "orders");
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut fields = HashMap::new();
        fields.insert("limit".to_string(), vec!["must be at most 500".to_string()]);

        let body = body_json(ApiError::ValidationError(fields).into_response()).await;
        assert_eq!(body["error"]["fields"]["limit"][0], "must be at most 500");
    }
}
