//! Boundary API used by producers and workers.

use crate::clock::{Clock, SystemClock};
use crate::config::LeaseConfig;
use crate::error::{LeaseError, LeaseResult};
use crate::job::{Job, JobStatus};
use crate::key::{JobKey, WorkerId};
use crate::lease_monitor::LeaseMonitor;
use crate::metrics::QueueMetrics;
use crate::scheduler::{Scheduler, WorkOffer};
use crate::state::{LeaseState, SharedLeaseState};
use crate::store::{EnqueueOutcome, JobCounts};
use crate::worker_registry::WorkerInfo;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a worker reports for its job.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Lookup finished; the payload is stored as the result.
    Success(Value),
    /// Lookup failed; stored as `{"error": message}`.
    Error(String),
}

impl LookupOutcome {
    fn into_result(self) -> (Value, bool) {
        match self {
            Self::Success(value) => (value, true),
            Self::Error(message) => (json!({ "error": message }), false),
        }
    }
}

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Jobs per status.
    pub jobs: JobCounts,
    /// Known workers.
    pub workers: usize,
    /// Workers holding a job.
    pub busy_workers: usize,
}

/// Entry point for every queue operation.
///
/// Cheap to clone; clones share the same state. Each call takes the state
/// lock exactly once and never awaits while holding it.
#[derive(Clone)]
pub struct LeaseGateway {
    state: SharedLeaseState,
    clock: Arc<dyn Clock>,
    scheduler: Scheduler,
    config: LeaseConfig,
}

impl LeaseGateway {
    /// Create a gateway using the system clock.
    pub fn new(config: LeaseConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a gateway with an explicit time source.
    pub fn with_clock(config: LeaseConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: LeaseState::shared(&config),
            clock,
            scheduler: Scheduler::new(config.lease()),
            config,
        }
    }

    /// Builds the reaper for this gateway's state.
    pub fn lease_monitor(&self) -> LeaseMonitor {
        LeaseMonitor::new(self.state.clone(), self.clock.clone(), self.config)
    }

    /// Returns the lease configuration.
    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    /// Queues a lookup for the ticket/plate pair.
    pub fn enqueue(&self, ticket_num: &str, plate_num: &str) -> LeaseResult<EnqueueOutcome> {
        let key = JobKey::new(ticket_num, plate_num)?;
        let now = self.clock.now();
        let mut state = self.state.lock();

        let outcome = match state.jobs.enqueue(key.clone(), now) {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, LeaseError::Conflict(_)) {
                    QueueMetrics::duplicate_enqueue("rejected");
                }
                warn!(key = %key, error = %e, "Enqueue refused");
                return Err(e);
            }
        };

        match outcome {
            EnqueueOutcome::Queued => {
                QueueMetrics::job_enqueued(false);
                info!(key = %key, "Enqueued job");
            }
            EnqueueOutcome::Restarted(previous) => {
                QueueMetrics::job_enqueued(true);
                QueueMetrics::duplicate_enqueue("restarted");
                info!(key = %key, previous = %previous, "Replaced unread result with a new job");
            }
            EnqueueOutcome::AlreadyQueued(status) => {
                QueueMetrics::duplicate_enqueue("ignored");
                debug!(key = %key, status = %status, "Duplicate enqueue ignored");
            }
        }
        state.publish_sizes();

        Ok(outcome)
    }

    /// Registers a worker or refreshes its last-seen time.
    pub fn register_worker(&self, client_id: &str) -> LeaseResult<WorkerInfo> {
        let worker = WorkerId::parse(client_id)?;
        let now = self.clock.now();
        let mut state = self.state.lock();

        state.workers.register(&worker, now);
        let info = state.workers.get(&worker)?.clone();
        state.publish_sizes();
        Ok(info)
    }

    /// Hands the oldest pending job to the worker.
    pub fn request_work(&self, client_id: &str) -> LeaseResult<WorkOffer> {
        let worker = WorkerId::parse(client_id)?;
        let now = self.clock.now();
        let mut state = self.state.lock();
        Ok(self.scheduler.request_work(&mut state, &worker, now))
    }

    /// Renews the worker's lease. Returns the new deadline.
    pub fn heartbeat(
        &self,
        client_id: &str,
        ticket_num: &str,
        plate_num: &str,
    ) -> LeaseResult<DateTime<Utc>> {
        let worker = WorkerId::parse(client_id)?;
        let key = JobKey::new(ticket_num, plate_num)?;
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state
            .jobs
            .renew_lease(&key, &worker, now, self.config.lease())
        {
            Ok(expires_at) => {
                state.workers.touch(&worker, now);
                debug!(key = %key, worker_id = %worker, lease_expires_at = %expires_at, "Lease renewed");
                Ok(expires_at)
            }
            Err(e) => {
                QueueMetrics::stale_report("heartbeat");
                warn!(key = %key, worker_id = %worker, error = %e, "Rejected heartbeat");
                Err(e)
            }
        }
    }

    /// Records the worker's result. Only the leaseholder is accepted.
    pub fn submit_result(
        &self,
        client_id: &str,
        ticket_num: &str,
        plate_num: &str,
        outcome: LookupOutcome,
    ) -> LeaseResult<JobStatus> {
        let worker = WorkerId::parse(client_id)?;
        let key = JobKey::new(ticket_num, plate_num)?;
        let (result, success) = outcome.into_result();
        let now = self.clock.now();
        let mut state = self.state.lock();

        let job = match state
            .jobs
            .transition_to_terminal(&key, &worker, result, success, now)
        {
            Ok(job) => job,
            Err(e) => {
                QueueMetrics::stale_report("result");
                warn!(key = %key, worker_id = %worker, error = %e, "Rejected result");
                return Err(e);
            }
        };

        state.workers.release_job(&worker, &key);
        state.workers.touch(&worker, now);
        if success {
            state.workers.record_job_completed(&worker);
            QueueMetrics::job_completed();
        } else {
            state.workers.record_job_failed(&worker);
            QueueMetrics::job_failed();
        }
        state.assert_lease_symmetry();

        info!(key = %key, worker_id = %worker, status = %job.status(), "Worker finished job");
        state.publish_sizes();
        Ok(job.status())
    }

    /// Reports a job's state. A terminal job is returned once and then
    /// removed; in-flight jobs are left in place.
    pub fn status(&self, ticket_num: &str, plate_num: &str) -> LeaseResult<Job> {
        let key = JobKey::new(ticket_num, plate_num)?;
        let mut state = self.state.lock();

        let job = state.jobs.get(&key)?;
        if !job.is_terminal() {
            return Ok(job.clone());
        }

        let job = state.jobs.consume_terminal(&key)?;
        debug!(key = %key, status = %job.status(), "Result delivered");
        state.publish_sizes();
        Ok(job)
    }

    /// Worker went away: its lease ends now under the timeout policy and the
    /// worker is forgotten. Returns the job key it held, if any.
    pub fn disconnect(&self, client_id: &str) -> LeaseResult<Option<JobKey>> {
        let worker = WorkerId::parse(client_id)?;
        let mut state = self.state.lock();

        let released = state.release_worker(&worker, self.config.timeout_policy);
        if let Some(lease) = &released {
            QueueMetrics::disconnect_release();
            info!(
                key = %lease.key,
                worker_id = %worker,
                requeued = lease.requeued,
                "Released lease of disconnected worker"
            );
        }
        state.workers.unregister(&worker);
        state.publish_sizes();

        Ok(released.map(|lease| lease.key))
    }

    /// Pending keys, oldest first.
    pub fn pending(&self) -> Vec<JobKey> {
        self.state.lock().jobs.pending_keys()
    }

    /// Known workers, ordered by ID.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.state.lock().workers.all()
    }

    /// Current counts.
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            jobs: state.jobs.counts(),
            workers: state.workers.len(),
            busy_workers: state.workers.busy_count(),
        }
    }
}
