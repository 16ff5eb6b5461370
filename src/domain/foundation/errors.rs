//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

use super::Role;

/// Event-level validation failures.
///
/// These never close a connection: the offending event is dropped and the
/// sender receives an `error` event describing what was wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' is required")]
    MissingField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        actual: f64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Frame is not a valid event: {reason}")]
    MalformedFrame { reason: String },

    #[error("Unsupported event '{event}'")]
    UnknownEvent { event: String },

    #[error("Event requires role '{required}', connection is '{actual}'")]
    RoleMismatch { required: Role, actual: Role },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates a missing field validation error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        ValidationError::MissingField {
            field: field.into(),
        }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64, actual: f64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        ValidationError::MalformedFrame {
            reason: reason.into(),
        }
    }

    pub fn unknown_event(event: impl Into<String>) -> Self {
        ValidationError::UnknownEvent {
            event: event.into(),
        }
    }

    /// Wire code sent back in the `error` event.
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::EmptyField { .. }
            | ValidationError::MissingField { .. }
            | ValidationError::OutOfRange { .. }
            | ValidationError::InvalidFormat { .. } => ErrorCode::InvalidPayload,
            ValidationError::MalformedFrame { .. } => ErrorCode::MalformedFrame,
            ValidationError::UnknownEvent { .. } => ErrorCode::UnknownEvent,
            ValidationError::RoleMismatch { .. } => ErrorCode::Forbidden,
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidPayload,
    MalformedFrame,
    UnknownEvent,

    // Authorization errors
    Unauthorized,
    Forbidden,

    // Infrastructure errors
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            ErrorCode::MalformedFrame => "MALFORMED_FRAME",
            ErrorCode::UnknownEvent => "UNKNOWN_EVENT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}
