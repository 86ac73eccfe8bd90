//! Unified error type surfaced at the parkq boundary.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for all parkq layers.
///
/// Lower crates keep their own narrow error enums and convert into this one
/// where a request crosses the HTTP boundary.
#[derive(Error, Debug)]
pub enum ParkqError {
    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflicting state transition or duplicate entry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Report from a worker that does not hold the lease
    #[error("Not assigned: {0}")]
    NotAssigned(String),

    /// Job capacity exhausted
    #[error("Queue is full: {0}")]
    QueueFull(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParkqError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::NotAssigned(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::QueueFull(_) => 503,
            Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::NotAssigned(_) => "NOT_ASSIGNED",
            Self::QueueFull(_) => "QUEUE_FULL",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if the caller may simply retry the same request later.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::QueueFull(_))
    }
}

/// Serializable error response for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional field-level errors for validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Field-level validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
}

impl ErrorResponse {
    /// Creates a new error response from a `ParkqError`.
    #[must_use]
    pub fn from_error(error: &ParkqError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }

    /// Sets field-level validation errors.
    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&ParkqError> for ErrorResponse {
    fn from(error: &ParkqError) -> Self {
        Self::from_error(error)
    }
}
