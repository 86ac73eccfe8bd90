//! Authoritative job table.
//!
//! Every job transition goes through [`JobStore`]. Pending jobs are also kept
//! in an index ordered by enqueue sequence so the oldest one is found without
//! scanning the table. A requeued job keeps its original sequence number and
//! therefore its place in line.

use crate::error::{LeaseError, LeaseResult};
use crate::job::{Job, JobState, JobStatus};
use crate::key::{JobKey, WorkerId};
use chrono::{DateTime, TimeDelta, Utc};
use parkq_config::{DuplicatePolicy, TimeoutPolicy};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// What an enqueue did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new pending job was created.
    Queued,
    /// An unread terminal record with the given status was replaced by a new
    /// pending job.
    Restarted(JobStatus),
    /// The key is already in flight; nothing changed.
    AlreadyQueued(JobStatus),
}

impl EnqueueOutcome {
    /// Returns true if a pending job was created.
    pub const fn queued(&self) -> bool {
        !matches!(self, Self::AlreadyQueued(_))
    }
}

/// A lease taken back from a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reclaimed {
    /// Job that lost its lease.
    pub key: JobKey,
    /// Worker that held it.
    pub worker: WorkerId,
    /// True if the job went back to pending, false if it was dropped.
    pub requeued: bool,
}

/// Number of resident jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobCounts {
    /// Total resident jobs.
    pub const fn total(&self) -> usize {
        self.pending + self.assigned + self.completed + self.failed
    }
}

/// Returns `now + lease`, saturating at the largest representable instant.
pub(crate) fn lease_deadline(now: DateTime<Utc>, lease: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(lease)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// In-memory job table.
#[derive(Debug)]
pub struct JobStore {
    jobs: HashMap<JobKey, Job>,
    pending: BTreeMap<u64, JobKey>,
    next_seq: u64,
    duplicate_policy: DuplicatePolicy,
    max_jobs: usize,
}

impl JobStore {
    /// Create an empty store. `max_jobs == 0` means unlimited.
    pub fn new(duplicate_policy: DuplicatePolicy, max_jobs: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            pending: BTreeMap::new(),
            next_seq: 0,
            duplicate_policy,
            max_jobs,
        }
    }

    /// Adds a pending job for `key`.
    ///
    /// In-flight keys are left untouched and terminal ones are restarted under
    /// the ignore policy; the reject policy refuses any existing key.
    pub fn enqueue(&mut self, key: JobKey, now: DateTime<Utc>) -> LeaseResult<EnqueueOutcome> {
        if let Some(existing) = self.jobs.get(&key) {
            let status = existing.status();
            if self.duplicate_policy == DuplicatePolicy::Reject {
                return Err(LeaseError::Conflict(format!(
                    "Job {} already exists with status {}",
                    key, status
                )));
            }
            if !status.is_terminal() {
                return Ok(EnqueueOutcome::AlreadyQueued(status));
            }
            self.insert_pending(key, now);
            return Ok(EnqueueOutcome::Restarted(status));
        }

        if self.max_jobs > 0 && self.jobs.len() >= self.max_jobs {
            return Err(LeaseError::QueueFull {
                limit: self.max_jobs,
            });
        }

        self.insert_pending(key, now);
        Ok(EnqueueOutcome::Queued)
    }

    fn insert_pending(&mut self, key: JobKey, now: DateTime<Utc>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq, key.clone());
        self.jobs.insert(key.clone(), Job::new(key, seq, now));
    }

    /// Looks up a job.
    pub fn get(&self, key: &JobKey) -> LeaseResult<&Job> {
        self.jobs
            .get(key)
            .ok_or_else(|| LeaseError::job_not_found(key))
    }

    /// Leases a pending job to `worker` until `now + lease`.
    pub fn transition_to_assigned(
        &mut self,
        key: &JobKey,
        worker: &WorkerId,
        now: DateTime<Utc>,
        lease: TimeDelta,
    ) -> LeaseResult<Job> {
        let job = self
            .jobs
            .get_mut(key)
            .ok_or_else(|| LeaseError::job_not_found(key))?;

        if job.status() != JobStatus::Pending {
            return Err(LeaseError::Conflict(format!(
                "Job {} is {}, not pending",
                key,
                job.status()
            )));
        }

        self.pending.remove(&job.seq());
        job.assign(worker.clone(), now, lease_deadline(now, lease));
        Ok(job.clone())
    }

    /// Renews the lease held by `worker`. The returned deadline is always
    /// strictly later than the previous one.
    pub fn renew_lease(
        &mut self,
        key: &JobKey,
        worker: &WorkerId,
        now: DateTime<Utc>,
        lease: TimeDelta,
    ) -> LeaseResult<DateTime<Utc>> {
        let job = self
            .jobs
            .get_mut(key)
            .ok_or_else(|| LeaseError::job_not_found(key))?;

        job.extend_lease(worker, lease_deadline(now, lease))
            .ok_or_else(|| LeaseError::not_owner(worker, key))
    }

    /// Records the result reported by the leaseholder.
    pub fn transition_to_terminal(
        &mut self,
        key: &JobKey,
        worker: &WorkerId,
        result: Value,
        success: bool,
        now: DateTime<Utc>,
    ) -> LeaseResult<Job> {
        let job = self
            .jobs
            .get_mut(key)
            .ok_or_else(|| LeaseError::job_not_found(key))?;

        if job.assigned_worker() != Some(worker) {
            return Err(LeaseError::not_owner(worker, key));
        }

        let state = if success {
            JobState::Completed {
                result,
                finished_at: now,
            }
        } else {
            JobState::Failed {
                result,
                finished_at: now,
            }
        };
        job.set_state(state);
        Ok(job.clone())
    }

    /// Takes back every lease whose deadline is at or before `now`, oldest
    /// job first.
    pub fn reclaim_expired(&mut self, now: DateTime<Utc>, policy: TimeoutPolicy) -> Vec<Reclaimed> {
        let mut expired: Vec<(u64, JobKey)> = self
            .jobs
            .values()
            .filter(|job| job.lease_expires_at().is_some_and(|at| at <= now))
            .map(|job| (job.seq(), job.key().clone()))
            .collect();
        expired.sort_unstable();

        expired
            .into_iter()
            .filter_map(|(_, key)| self.reclaim(&key, policy))
            .collect()
    }

    /// Takes back the lease on `key` regardless of its deadline. Returns None
    /// if the job is not assigned.
    pub fn reclaim(&mut self, key: &JobKey, policy: TimeoutPolicy) -> Option<Reclaimed> {
        let job = self.jobs.get_mut(key)?;
        let worker = job.assigned_worker()?.clone();

        let requeued = policy.requeues();
        if requeued {
            job.set_state(JobState::Pending);
            self.pending.insert(job.seq(), key.clone());
        } else {
            self.jobs.remove(key);
        }

        Some(Reclaimed {
            key: key.clone(),
            worker,
            requeued,
        })
    }

    /// Removes and returns a terminal job. In-flight jobs are a conflict.
    pub fn consume_terminal(&mut self, key: &JobKey) -> LeaseResult<Job> {
        let status = self.get(key)?.status();
        if !status.is_terminal() {
            return Err(LeaseError::Conflict(format!(
                "Job {} is {}, no result yet",
                key, status
            )));
        }
        self.jobs
            .remove(key)
            .ok_or_else(|| LeaseError::job_not_found(key))
    }

    /// Removes terminal jobs finished at or before `cutoff`.
    pub fn purge_terminal(&mut self, cutoff: DateTime<Utc>) -> Vec<JobKey> {
        let stale: Vec<JobKey> = self
            .jobs
            .values()
            .filter(|job| job.finished_at().is_some_and(|at| at <= cutoff))
            .map(|job| job.key().clone())
            .collect();

        for key in &stale {
            self.jobs.remove(key);
            debug!(key = %key, "Purged unread result");
        }
        stale
    }

    /// Pending keys, oldest first.
    pub fn pending_keys(&self) -> Vec<JobKey> {
        self.pending.values().cloned().collect()
    }

    /// First pending entry with sequence number `>= from`.
    pub(crate) fn pending_from(&self, from: u64) -> Option<(u64, JobKey)> {
        self.pending
            .range(from..)
            .next()
            .map(|(seq, key)| (*seq, key.clone()))
    }

    /// Current (key, leaseholder) pairs.
    pub fn assignments(&self) -> impl Iterator<Item = (&JobKey, &WorkerId)> {
        self.jobs
            .iter()
            .filter_map(|(key, job)| job.assigned_worker().map(|worker| (key, worker)))
    }

    /// Counts resident jobs per status.
    pub fn counts(&self) -> JobCounts {
        self.jobs
            .values()
            .fold(JobCounts::default(), |mut counts, job| {
                match job.status() {
                    JobStatus::Pending => counts.pending += 1,
                    JobStatus::Assigned => counts.assigned += 1,
                    JobStatus::Completed => counts.completed += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    /// Number of resident jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns true if no job is resident.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default(), 0)
    }
}
