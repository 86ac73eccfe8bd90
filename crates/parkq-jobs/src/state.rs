//! Queue state shared by the gateway and the lease monitor.

use crate::config::LeaseConfig;
use crate::key::WorkerId;
use crate::metrics::QueueMetrics;
use crate::store::{JobStore, Reclaimed};
use crate::worker_registry::WorkerRegistry;
use chrono::{DateTime, Utc};
use parkq_config::TimeoutPolicy;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Handle to the state behind its single lock.
pub type SharedLeaseState = Arc<Mutex<LeaseState>>;

/// Job table and worker registry, mutated together under one lock.
#[derive(Debug)]
pub struct LeaseState {
    pub(crate) jobs: JobStore,
    pub(crate) workers: WorkerRegistry,
}

impl LeaseState {
    /// Create empty state for the given configuration.
    pub fn new(config: &LeaseConfig) -> Self {
        Self {
            jobs: JobStore::new(config.duplicate_policy, config.max_jobs),
            workers: WorkerRegistry::new(),
        }
    }

    /// Wraps the state for sharing.
    pub fn shared(config: &LeaseConfig) -> SharedLeaseState {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Read access to the job table.
    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Read access to the worker registry.
    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    /// Reclaims expired leases and frees the former holders.
    pub(crate) fn reclaim_expired(
        &mut self,
        now: DateTime<Utc>,
        policy: TimeoutPolicy,
    ) -> Vec<Reclaimed> {
        let reclaimed = self.jobs.reclaim_expired(now, policy);
        for lease in &reclaimed {
            self.workers.release_job(&lease.worker, &lease.key);
            QueueMetrics::lease_reclaimed(if lease.requeued { "requeue" } else { "drop" });
            info!(
                key = %lease.key,
                worker_id = %lease.worker,
                requeued = lease.requeued,
                "Lease expired"
            );
        }
        if !reclaimed.is_empty() {
            self.assert_lease_symmetry();
            self.publish_sizes();
        }
        reclaimed
    }

    /// Takes back whatever job `worker` holds.
    pub(crate) fn release_worker(
        &mut self,
        worker: &WorkerId,
        policy: TimeoutPolicy,
    ) -> Option<Reclaimed> {
        let key = self.workers.get(worker).ok()?.current_job.clone()?;
        let released = self.jobs.reclaim(&key, policy);
        self.workers.release_job(worker, &key);
        self.assert_lease_symmetry();
        released
    }

    /// Panics if a job and its leaseholder disagree.
    ///
    /// The registry slot is an `Option`, so a worker can never hold two jobs;
    /// this checks the two directions of the job/worker link.
    pub(crate) fn assert_lease_symmetry(&self) {
        for (key, worker) in self.jobs.assignments() {
            let held = self
                .workers
                .get(worker)
                .ok()
                .and_then(|info| info.current_job.as_ref());
            assert!(
                held == Some(key),
                "lease symmetry violated: {} is assigned to {} but the worker holds {:?}",
                key,
                worker,
                held
            );
        }

        for info in self.workers.iter() {
            if let Some(key) = &info.current_job {
                let owner = self
                    .jobs
                    .get(key)
                    .ok()
                    .and_then(|job| job.assigned_worker());
                assert!(
                    owner == Some(&info.id),
                    "lease symmetry violated: worker {} holds {} but the job is leased to {:?}",
                    info.id,
                    key,
                    owner
                );
            }
        }
    }

    /// Logs and exports queue sizes.
    pub(crate) fn publish_sizes(&self) {
        let counts = self.jobs.counts();
        QueueMetrics::update_queue_sizes(&counts, self.workers.len());
        debug!(
            pending = counts.pending,
            assigned = counts.assigned,
            unread = counts.completed + counts.failed,
            "Queue size"
        );
    }
}
