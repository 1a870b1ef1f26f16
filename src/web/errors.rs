//! # Web API Error Types
//!
//! HTTP rendering of delivery failures. The status code is what the push
//! subscription acts on: 4xx stops redelivery, 5xx triggers it.

use crate::error::{ErrorClass, KiorgaError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad Request: {message}")]
    BadRequest { message: String },

    #[error("Internal Server Error: {message}")]
    Internal { message: String },
}

impl ApiError {
    /// Create a BadRequest error with a custom message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message) = match &self {
            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message.as_str())
            }
            ApiError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message.as_str(),
            ),
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

/// Permanent failures become 400 so the message is not redelivered
impl From<KiorgaError> for ApiError {
    fn from(err: KiorgaError) -> Self {
        match err.class() {
            ErrorClass::Permanent => ApiError::bad_request(err.to_string()),
            ErrorClass::Transient => match err {
                KiorgaError::Unexpected { .. } => ApiError::internal("unexpected error"),
                other => ApiError::internal(other.to_string()),
            },
        }
    }
}

/// Result type alias for web API operations
pub type ApiResult<T> = Result<T, ApiError>;
