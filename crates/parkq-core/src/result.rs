//! Result type aliases for parkq.

use crate::ParkqError;

/// A specialized `Result` type for parkq operations.
pub type ParkqResult<T> = Result<T, ParkqError>;
