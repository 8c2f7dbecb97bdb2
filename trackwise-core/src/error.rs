//! Error types for Trackwise operations

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EntityKind;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Duplicate,
    PreconditionFailed,
    ValidationFailed,
    Forbidden,
    Unavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Duplicate => "DUPLICATE",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Storage backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Stored {kind} document is unreadable: {reason}")]
    CorruptDocument { kind: EntityKind, reason: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by commands and queries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("{kind} {id} was not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} '{key}' already exists in {scope}")]
    Duplicate {
        kind: EntityKind,
        scope: String,
        key: String,
    },

    #[error("{kind} {id} has been modified since it was read")]
    PreconditionFailed { kind: EntityKind, id: String },

    #[error("Validation failed: {}", join_failures(.failures))]
    ValidationFailed { failures: Vec<FieldError> },

    #[error("Access to {kind} {id} is not allowed")]
    Forbidden { kind: EntityKind, id: String },

    #[error("Service unavailable: {reason}")]
    Unavailable { reason: String },
}

impl TrackError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn precondition_failed(kind: EntityKind, id: impl ToString) -> Self {
        Self::PreconditionFailed {
            kind,
            id: id.to_string(),
        }
    }

    pub fn forbidden(kind: EntityKind, id: impl ToString) -> Self {
        Self::Forbidden {
            kind,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            TrackError::NotFound { .. } => ErrorCode::NotFound,
            TrackError::Duplicate { .. } => ErrorCode::Duplicate,
            TrackError::PreconditionFailed { .. } => ErrorCode::PreconditionFailed,
            TrackError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            TrackError::Forbidden { .. } => ErrorCode::Forbidden,
            TrackError::Unavailable { .. } => ErrorCode::Unavailable,
        }
    }
}

impl From<StorageError> for TrackError {
    fn from(err: StorageError) -> Self {
        TrackError::Unavailable {
            reason: err.to_string(),
        }
    }
}

fn join_failures(failures: &[FieldError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for Trackwise operations.
pub type TrackResult<T> = Result<T, TrackError>;
