//! Assignment of pending jobs to polling workers.

use crate::job::Job;
use crate::key::{JobKey, WorkerId};
use crate::metrics::QueueMetrics;
use crate::state::LeaseState;
use chrono::{DateTime, TimeDelta, Utc};
use parkq_config::TimeoutPolicy;
use tracing::{error, info, warn};

/// Answer to a worker asking for work.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOffer {
    /// A job was leased to the worker.
    Assigned(Job),
    /// The worker already holds this job.
    Busy(JobKey),
    /// Nothing is pending; poll again later.
    NoneAvailable,
}

/// Hands out the oldest pending job. Holds no state besides the lease length.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    lease: TimeDelta,
}

impl Scheduler {
    /// Create a scheduler granting leases of `lease`.
    pub fn new(lease: TimeDelta) -> Self {
        Self { lease }
    }

    /// Leases the oldest pending job to `worker`.
    ///
    /// Polling counts as a sign of life and registers unknown workers. The
    /// store transition and the registry update happen together under the
    /// caller's lock; a job that refuses the transition is skipped in favour
    /// of the next one in line.
    pub fn request_work(
        &self,
        state: &mut LeaseState,
        worker: &WorkerId,
        now: DateTime<Utc>,
    ) -> WorkOffer {
        if let Some(key) = state.workers.touch(worker, now).current_job.clone() {
            return WorkOffer::Busy(key);
        }

        let mut cursor = 0;
        while let Some((seq, key)) = state.jobs.pending_from(cursor) {
            cursor = seq + 1;

            let job = match state
                .jobs
                .transition_to_assigned(&key, worker, now, self.lease)
            {
                Ok(job) => job,
                Err(e) => {
                    warn!(key = %key, worker_id = %worker, error = %e, "Skipping unassignable job");
                    continue;
                }
            };

            if let Err(e) = state.workers.set_current_job(worker, Some(key.clone())) {
                error!(key = %key, worker_id = %worker, error = %e, "Worker vanished during assignment");
                state.jobs.reclaim(&key, TimeoutPolicy::Requeue);
                return WorkOffer::NoneAvailable;
            }
            state.assert_lease_symmetry();

            let wait = (now - job.created_at()).to_std().unwrap_or_default();
            QueueMetrics::job_assigned(wait, job.attempts());
            info!(
                key = %key,
                worker_id = %worker,
                attempt = job.attempts(),
                "Assigned job"
            );
            state.publish_sizes();
            return WorkOffer::Assigned(job);
        }

        WorkOffer::NoneAvailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LeaseConfig;
    use crate::job::JobStatus;

    fn id(s: &str) -> WorkerId {
        WorkerId::parse(s).unwrap()
    }

    fn key(ticket: &str) -> JobKey {
        JobKey::new(ticket, "CZCL340").unwrap()
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(TimeDelta::seconds(5))
    }

    #[test]
    fn test_none_available_registers_worker() {
        let mut state = LeaseState::new(&LeaseConfig::default());
        let offer = scheduler().request_work(&mut state, &id("w1"), Utc::now());
        assert_eq!(offer, WorkOffer::NoneAvailable);
        assert!(state.workers().get(&id("w1")).is_ok());
    }

    #[test]
    fn test_fifo_assignment() {
        let mut state = LeaseState::new(&LeaseConfig::default());
        let now = Utc::now();
        state.jobs.enqueue(key("PM2"), now).unwrap();
        state.jobs.enqueue(key("PM1"), now).unwrap();

        let WorkOffer::Assigned(first) = scheduler().request_work(&mut state, &id("w1"), now) else {
            panic!("expected assignment");
        };
        assert_eq!(first.key(), &key("PM2"));
        assert_eq!(first.status(), JobStatus::Assigned);
        assert_eq!(first.lease_expires_at(), Some(now + TimeDelta::seconds(5)));

        let WorkOffer::Assigned(second) = scheduler().request_work(&mut state, &id("w2"), now) else {
            panic!("expected assignment");
        };
        assert_eq!(second.key(), &key("PM1"));
    }

    #[test]
    fn test_busy_worker_gets_no_second_job() {
        let mut state = LeaseState::new(&LeaseConfig::default());
        let now = Utc::now();
        state.jobs.enqueue(key("PM1"), now).unwrap();
        state.jobs.enqueue(key("PM2"), now).unwrap();

        scheduler().request_work(&mut state, &id("w1"), now);
        let offer = scheduler().request_work(&mut state, &id("w1"), now);
        assert_eq!(offer, WorkOffer::Busy(key("PM1")));
        assert_eq!(state.jobs().pending_keys(), vec![key("PM2")]);
    }

    #[test]
    fn test_requeued_job_served_first() {
        let mut state = LeaseState::new(&LeaseConfig::default());
        let now = Utc::now();
        state.jobs.enqueue(key("PM1"), now).unwrap();
        state.jobs.enqueue(key("PM2"), now).unwrap();
        scheduler().request_work(&mut state, &id("w1"), now);

        let later = now + TimeDelta::seconds(6);
        state.reclaim_expired(later, TimeoutPolicy::Requeue);

        let WorkOffer::Assigned(job) = scheduler().request_work(&mut state, &id("w2"), later) else {
            panic!("expected assignment");
        };
        assert_eq!(job.key(), &key("PM1"));
        assert_eq!(job.attempts(), 2);
    }
}
