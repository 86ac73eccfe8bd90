//! Lease and enqueue policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the reaper does with a job whose lease lapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Expired jobs go back to pending and are handed to the next poller.
    #[default]
    Requeue,
    /// Expired jobs are deleted; the producer has to enqueue again.
    Drop,
}

impl TimeoutPolicy {
    /// Returns true if expired jobs are put back on the queue.
    #[must_use]
    pub const fn requeues(&self) -> bool {
        matches!(self, Self::Requeue)
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requeue => write!(f, "requeue"),
            Self::Drop => write!(f, "drop"),
        }
    }
}

/// How enqueue treats a key that already has a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// In-flight duplicates answer `queued: false`; a terminal record is
    /// replaced by a fresh pending job.
    #[default]
    Ignore,
    /// Any existing record makes enqueue fail with a conflict.
    Reject,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}
