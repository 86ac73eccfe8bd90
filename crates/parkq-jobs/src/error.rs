//! Lease and lookup error types.

use parkq_core::ParkqError;
use std::time::Duration;
use thiserror::Error;

/// Result type for queue operations.
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Queue-related errors.
///
/// None of these are fatal: each one is reported to the caller and leaves the
/// queue state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transition not allowed from the current state, or a duplicate under the
    /// reject policy.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Heartbeat or result from a worker that does not hold the lease.
    #[error("Worker {worker_id} does not hold the lease on {key}")]
    NotOwner { worker_id: String, key: String },

    /// Job or worker not found.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Enqueue refused because the store holds `limit` records.
    #[error("Queue is full: {limit} jobs resident")]
    QueueFull { limit: usize },
}

impl LeaseError {
    /// Creates a job-not-found error.
    pub fn job_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            resource: "Job",
            id: key.to_string(),
        }
    }

    /// Creates a worker-not-found error.
    pub fn worker_not_found(worker_id: impl ToString) -> Self {
        Self::NotFound {
            resource: "Worker",
            id: worker_id.to_string(),
        }
    }

    /// Creates a not-owner error.
    pub fn not_owner(worker_id: impl ToString, key: impl ToString) -> Self {
        Self::NotOwner {
            worker_id: worker_id.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<LeaseError> for ParkqError {
    fn from(err: LeaseError) -> Self {
        match err {
            LeaseError::Validation(msg) => ParkqError::Validation(msg),
            LeaseError::Conflict(msg) => ParkqError::Conflict(msg),
            err @ LeaseError::NotOwner { .. } => ParkqError::NotAssigned(err.to_string()),
            LeaseError::NotFound { resource, id } => ParkqError::NotFound {
                resource_type: resource,
                id,
            },
            err @ LeaseError::QueueFull { .. } => ParkqError::QueueFull(err.to_string()),
        }
    }
}

/// Errors reported by a lookup executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The lookup ran and reported an error.
    #[error("Lookup failed: {0}")]
    Failed(String),

    /// The lookup did not finish in time.
    #[error("Lookup timed out after {0:?}")]
    TimedOut(Duration),
}
