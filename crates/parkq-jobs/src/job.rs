//! Job records and their lifecycle states.

use crate::key::{JobKey, WorkerId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Job status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a worker.
    Pending,
    /// Leased to exactly one worker.
    Assigned,
    /// Lookup succeeded; result waits for its single read.
    Completed,
    /// Lookup reported an error; result waits for its single read.
    Failed,
}

impl JobStatus {
    /// Returns true for Completed and Failed.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Assigned => write!(f, "assigned"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Per-status data. The worker and lease only exist while Assigned, the
/// result only once terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Waiting for a worker.
    Pending,
    /// Leased to `worker` until `lease_expires_at`.
    Assigned {
        worker: WorkerId,
        assigned_at: DateTime<Utc>,
        lease_expires_at: DateTime<Utc>,
    },
    /// Finished successfully.
    Completed {
        result: Value,
        finished_at: DateTime<Utc>,
    },
    /// Finished with an error payload.
    Failed {
        result: Value,
        finished_at: DateTime<Utc>,
    },
}

impl JobState {
    /// Returns the status tag of this state.
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Assigned { .. } => JobStatus::Assigned,
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// A lookup job as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    key: JobKey,
    state: JobState,
    created_at: DateTime<Utc>,
    seq: u64,
    attempts: u32,
}

impl Job {
    pub(crate) fn new(key: JobKey, seq: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            key,
            state: JobState::Pending,
            created_at,
            seq,
            attempts: 0,
        }
    }

    /// Returns the job key.
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Returns the full lifecycle state.
    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Returns the status tag.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Returns the leaseholder while Assigned.
    pub fn assigned_worker(&self) -> Option<&WorkerId> {
        match &self.state {
            JobState::Assigned { worker, .. } => Some(worker),
            _ => None,
        }
    }

    /// Returns the lease deadline while Assigned.
    pub fn lease_expires_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            JobState::Assigned {
                lease_expires_at, ..
            } => Some(*lease_expires_at),
            _ => None,
        }
    }

    /// Returns the recorded result once terminal.
    pub fn result(&self) -> Option<&Value> {
        match &self.state {
            JobState::Completed { result, .. } | JobState::Failed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Returns when the result was recorded.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            JobState::Completed { finished_at, .. } | JobState::Failed { finished_at, .. } => {
                Some(*finished_at)
            }
            _ => None,
        }
    }

    /// Returns when the job was enqueued.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns how many times the job has been leased.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true once the job holds a result.
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn assign(
        &mut self,
        worker: WorkerId,
        now: DateTime<Utc>,
        lease_expires_at: DateTime<Utc>,
    ) {
        self.attempts += 1;
        self.state = JobState::Assigned {
            worker,
            assigned_at: now,
            lease_expires_at,
        };
    }

    /// Moves the deadline to `deadline`, or 1 ms past the current one if that
    /// is later. Returns None unless `worker` holds the lease.
    pub(crate) fn extend_lease(
        &mut self,
        worker: &WorkerId,
        deadline: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match &mut self.state {
            JobState::Assigned {
                worker: holder,
                lease_expires_at,
                ..
            } if *holder == *worker => {
                let bumped = lease_expires_at
                    .checked_add_signed(TimeDelta::milliseconds(1))
                    .unwrap_or(*lease_expires_at);
                *lease_expires_at = deadline.max(bumped);
                Some(*lease_expires_at)
            }
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> JobKey {
        JobKey::new("PM451052", "CZCL340").unwrap()
    }

    #[test]
    fn test_new_job_is_pending() {
        let now = Utc::now();
        let job = Job::new(key(), 1, now);
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.created_at(), now);
        assert!(job.assigned_worker().is_none());
        assert!(job.lease_expires_at().is_none());
        assert!(job.result().is_none());
        assert_eq!(job.attempts(), 0);
    }

    #[test]
    fn test_assigned_fields_only_while_assigned() {
        let now = Utc::now();
        let mut job = Job::new(key(), 1, now);
        let worker = WorkerId::parse("w1").unwrap();
        job.assign(worker.clone(), now, now + chrono::TimeDelta::seconds(5));
        assert_eq!(job.assigned_worker(), Some(&worker));
        assert_eq!(job.attempts(), 1);

        job.set_state(JobState::Completed {
            result: json!({"amount": "30.00"}),
            finished_at: now,
        });
        assert!(job.is_terminal());
        assert!(job.assigned_worker().is_none());
        assert!(job.lease_expires_at().is_none());
        assert_eq!(job.result(), Some(&json!({"amount": "30.00"})));
        assert_eq!(job.finished_at(), Some(now));
    }

    #[test]
    fn test_extend_lease_is_strictly_forward() {
        let now = Utc::now();
        let mut job = Job::new(key(), 1, now);
        let owner = WorkerId::parse("w1").unwrap();
        let expires = now + TimeDelta::seconds(5);
        job.assign(owner.clone(), now, expires);

        let earlier = now + TimeDelta::seconds(1);
        let renewed = job.extend_lease(&owner, earlier).unwrap();
        assert!(renewed > expires);

        let later = now + TimeDelta::seconds(9);
        assert_eq!(job.extend_lease(&owner, later), Some(later));

        let other = WorkerId::parse("w2").unwrap();
        assert_eq!(job.extend_lease(&other, later + TimeDelta::seconds(1)), None);
        assert_eq!(job.lease_expires_at(), Some(later));
    }

    #[test]
    fn test_status_display_and_serde() {
        assert_eq!(JobStatus::Assigned.to_string(), "assigned");
        assert_eq!(serde_json::to_value(JobStatus::Failed).unwrap(), json!("failed"));
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
