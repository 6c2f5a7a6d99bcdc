//! Error handling for the Marquee API
//!
//! A single error type with HTTP status code mapping via Axum's
//! IntoResponse trait. Bodies are `{code, message, details?}`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::chat::APOLOGY_MESSAGE;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Main API error type
#[derive(Error, Debug)]
pub enum ApiError {
    // ========== Resource Errors ==========
    /// Requested resource not found
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    // ========== Validation Errors ==========
    /// Request validation failed
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Invalid request body format
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Invalid query parameter
    #[error("invalid query parameters: {0}")]
    InvalidQuery(String),

    // ========== Database Errors ==========
    /// Database query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    // ========== Chat Errors ==========
    /// A chat turn could not be completed or persisted
    #[error("chat turn failed: {0}")]
    ChatFailed(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::NotFound { .. } => StatusCode::NOT_FOUND,

            // 400 Bad Request
            Self::ValidationError(_) | Self::InvalidBody(_) | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,

            // 500 Internal Server Error
            Self::Database(_) | Self::ChatFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::InvalidQuery(_) => "INVALID_QUERY_PARAM",
            Self::Database(_) => "DATABASE_ERROR",
            Self::ChatFailed(_) => "CHAT_FAILED",
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Message shown to the client; server-side details stay in the logs
    fn public_message(&self) -> String {
        match self {
            Self::ChatFailed(_) => APOLOGY_MESSAGE.to_string(),
            Self::Database(_) => "database error".to_string(),
            other => other.to_string(),
        }
    }

    /// Log the error with appropriate severity based on status code
    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::debug!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Client error"
            );
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let error_response = ErrorResponse {
            code: self.error_code(),
            message: self.public_message(),
            details: None,
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

// ========== Conversion Implementations ==========

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidQuery(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::not_found("conversation", "123").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::ValidationError("test".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ChatFailed("db down".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::not_found("conversation", "123").error_code(),
            "NOT_FOUND"
        );
        assert_eq!(ApiError::InvalidBody("x".to_string()).error_code(), "INVALID_BODY");
    }

    #[test]
    fn test_chat_failures_show_the_apology() {
        let err = ApiError::ChatFailed("connection reset".to_string());
        assert_eq!(err.public_message(), APOLOGY_MESSAGE);
        assert_eq!(err.to_string(), "chat turn failed: connection reset");
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::not_found("conversation", "abc123");
        assert_eq!(err.to_string(), "conversation not found: abc123");
    }
}
