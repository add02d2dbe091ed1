//! Error types for mkb-content
//!
//! Every error renders as `{"error": {"code", "message", "details"?}}`,
//! except platform rejections, which pass the platform's own status and body
//! through unchanged.

use crate::media::CacheError;
use crate::services::{GenerationError, PublishError};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request failed validation (422)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Conflict with existing state (409)
    #[error("Conflict: {message}")]
    Conflict { message: String, details: Value },

    /// Upstream unavailable or returned an unusable response (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Upstream error with a readable explanation, status preserved
    #[error("Upstream error {status}: {message}")]
    Upstream {
        status: u16,
        code: &'static str,
        message: String,
        details: Value,
    },

    /// Upstream response relayed verbatim
    #[error("Upstream returned status {status}")]
    Passthrough { status: u16, body: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// mkb-common error
    #[error("Common error: {0}")]
    Common(#[from] mkb_common::Error),
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidKey(key) => ApiError::BadRequest(format!("Invalid media id: {}", key)),
            CacheError::NotFound(key) => ApiError::NotFound(format!("Media {}", key)),
            CacheError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::NotFound(id) => ApiError::NotFound(format!("Post {}", id)),
            PublishError::AlreadyPublished(_) => ApiError::BadRequest(err.to_string()),
            PublishError::Platform { status, body } => ApiError::Passthrough { status, body },
            PublishError::CredentialMisconfigured {
                status,
                message,
                body,
            } => ApiError::Upstream {
                status,
                code: "PLATFORM_CREDENTIAL_MISCONFIGURED",
                message,
                details: parse_body(&body),
            },
            PublishError::Gateway(msg) => ApiError::BadGateway(msg),
            PublishError::MissingIdentifier => ApiError::BadGateway(err.to_string()),
            PublishError::Conflict {
                post_id,
                existing_post_id,
                ref meta_post_id,
            } => ApiError::Conflict {
                message: err.to_string(),
                details: json!({
                    "post_id": post_id,
                    "existing_post_id": existing_post_id,
                    "meta_post_id": meta_post_id,
                }),
            },
            PublishError::Storage(e) => ApiError::Common(e),
        }
    }
}

/// JSON body when parseable, otherwise the raw text
fn parse_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::Passthrough { status, body } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                return (status, [(header::CONTENT_TYPE, content_type_of(&body))], body)
                    .into_response();
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg,
                None,
            ),
            ApiError::Conflict { message, details } => {
                (StatusCode::CONFLICT, "CONFLICT", message, Some(details))
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg, None),
            ApiError::Upstream {
                status,
                code,
                message,
                details,
            } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                code,
                message,
                Some(details),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
                None,
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
                None,
            ),
            ApiError::Common(ref err) => {
                let status = match err {
                    mkb_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    mkb_common::Error::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "COMMON_ERROR", err.to_string(), None)
            }
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

fn content_type_of(body: &str) -> &'static str {
    if serde_json::from_str::<Value>(body).is_ok() {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
