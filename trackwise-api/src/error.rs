//! Error Types for the Trackwise API
//!
//! `ApiError` is the structured body returned by every endpoint. Each
//! `ErrorCode` maps to exactly one HTTP status through an explicit table.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use trackwise_core::{StorageError, TrackError};
use trackwise_storage::CacheError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request lacks a caller identity
    Unauthorized,

    /// Caller does not own the resource
    Forbidden,

    /// One or more field validators rejected the request
    ValidationFailed,

    /// Request could not be parsed
    InvalidInput,

    /// Entity is absent or soft-deleted
    NotFound,

    /// A live sibling in the same scope holds the same unique key
    Duplicate,

    /// The supplied version tag is no longer current
    PreconditionFailed,

    /// Store backend unreachable
    Unavailable,

    /// Unexpected fault
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Duplicate => StatusCode::CONFLICT,
            ErrorCode::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Caller identity is required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::NotFound => "Entity not found",
            ErrorCode::Duplicate => "Entity already exists",
            ErrorCode::PreconditionFailed => {
                "The resource has been modified since you last read it"
            }
            ErrorCode::Unavailable => "Service temporarily unavailable",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl From<trackwise_core::ErrorCode> for ErrorCode {
    fn from(code: trackwise_core::ErrorCode) -> Self {
        use trackwise_core::ErrorCode as Core;
        match code {
            Core::NotFound => ErrorCode::NotFound,
            Core::Duplicate => ErrorCode::Duplicate,
            Core::PreconditionFailed => ErrorCode::PreconditionFailed,
            Core::ValidationFailed => ErrorCode::ValidationFailed,
            Core::Forbidden => ErrorCode::Forbidden,
            Core::Unavailable => ErrorCode::Unavailable,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (per-field validation failures)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<TrackError> for ApiError {
    fn from(err: TrackError) -> Self {
        let code = ErrorCode::from(err.code());
        match err {
            TrackError::ValidationFailed { failures } => {
                let details = serde_json::json!({ "failures": failures });
                ApiError::from_code(code).with_details(details)
            }
            TrackError::Unavailable { reason } => {
                tracing::error!(%reason, "Store unavailable");
                ApiError::from_code(code)
            }
            other => ApiError::new(code, other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::from(TrackError::from(err))
    }
}

/// Only reachable at startup; cache errors never escape the read path.
impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::error!(error = %err, "Cache backend setup failed");
        ApiError::new(ErrorCode::Unavailable, format!("Cache backend unavailable: {}", err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use trackwise_core::{EntityKind, FieldError};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::PreconditionFailed.status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(ErrorCode::Unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_failures_land_in_details() {
        let err = ApiError::from(TrackError::ValidationFailed {
            failures: vec![FieldError::new("name", "must not be blank")],
        });
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        let details = err.details.unwrap_or_default();
        assert_eq!(details["failures"][0]["field"], "name");
    }

    #[test]
    fn test_unavailable_hides_backend_reason() {
        let err = ApiError::from(TrackError::Unavailable {
            reason: "connection refused on 10.0.0.7".into(),
        });
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("10.0.0.7"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::from(TrackError::precondition_failed(EntityKind::Task, "t1"));
        let json = serde_json::to_value(&err)?;
        assert_eq!(json["code"], "PRECONDITION_FAILED");
        assert!(json.get("details").is_none());
        Ok(())
    }
}
