//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::EntityError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters
    InvalidRequest(String),

    /// Resource not found or not registered
    NotFound(String),

    /// An entity or one of its dependencies did not answer
    Unavailable(String),

    /// Internal server error
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<EntityError> for ApiError {
    fn from(err: EntityError) -> Self {
        let message = err.to_string();
        match err {
            EntityError::NotRegistered(_) | EntityError::NotFound(_) => ApiError::NotFound(message),
            EntityError::InvalidReading(_) => ApiError::InvalidRequest(message),
            EntityError::DependencyUnavailable(_)
            | EntityError::Unavailable(_)
            | EntityError::Timeout(_) => ApiError::Unavailable(message),
        }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}
