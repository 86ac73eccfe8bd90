//! Worker registry for tracking polling workers.
//!
//! Manages registration, last-seen timestamps, the job each worker holds and
//! cleanup of idle workers that stopped polling.

use crate::error::{LeaseError, LeaseResult};
use crate::key::{JobKey, WorkerId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::hash_map::{Entry, HashMap};
use tracing::{debug, info};

/// Information about a registered worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    /// Worker ID.
    pub id: WorkerId,
    /// Registration timestamp.
    pub registered_at: DateTime<Utc>,
    /// Last poll, heartbeat or result.
    pub last_seen_at: DateTime<Utc>,
    /// Job currently leased to this worker.
    pub current_job: Option<JobKey>,
    /// Total results reported as completed.
    pub jobs_completed: u64,
    /// Total results reported as failed.
    pub jobs_failed: u64,
}

impl WorkerInfo {
    fn new(id: WorkerId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            registered_at: now,
            last_seen_at: now,
            current_job: None,
            jobs_completed: 0,
            jobs_failed: 0,
        }
    }

    /// Returns true if the worker holds no job.
    pub fn is_idle(&self) -> bool {
        self.current_job.is_none()
    }
}

/// Registry of known workers.
///
/// Not synchronized on its own; it lives inside the queue state and shares
/// that lock with the job store.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerId, WorkerInfo>,
    registration_count: u64,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker, or refreshes its last-seen time if already known.
    ///
    /// Returns true if the worker was not known before.
    pub fn register(&mut self, worker_id: &WorkerId, now: DateTime<Utc>) -> bool {
        let (_, created) = self.upsert(worker_id, now);
        if !created {
            debug!(worker_id = %worker_id, "Worker re-registered");
        }
        created
    }

    /// Updates last-seen, registering unknown workers on the fly.
    pub fn touch(&mut self, worker_id: &WorkerId, now: DateTime<Utc>) -> &WorkerInfo {
        self.upsert(worker_id, now).0
    }

    fn upsert(&mut self, worker_id: &WorkerId, now: DateTime<Utc>) -> (&mut WorkerInfo, bool) {
        match self.workers.entry(worker_id.clone()) {
            Entry::Occupied(entry) => {
                let worker = entry.into_mut();
                worker.last_seen_at = now;
                (worker, false)
            }
            Entry::Vacant(entry) => {
                self.registration_count += 1;
                info!(
                    worker_id = %worker_id,
                    registration_seq = self.registration_count,
                    "Worker registered"
                );
                (entry.insert(WorkerInfo::new(worker_id.clone(), now)), true)
            }
        }
    }

    /// Sets or clears the job a worker holds.
    pub fn set_current_job(
        &mut self,
        worker_id: &WorkerId,
        key: Option<JobKey>,
    ) -> LeaseResult<()> {
        let worker = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| LeaseError::worker_not_found(worker_id))?;
        worker.current_job = key;
        Ok(())
    }

    /// Clears the job slot only if it still points at `key`.
    pub(crate) fn release_job(&mut self, worker_id: &WorkerId, key: &JobKey) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            if worker.current_job.as_ref() == Some(key) {
                worker.current_job = None;
            }
        }
    }

    /// Get information about a specific worker.
    pub fn get(&self, worker_id: &WorkerId) -> LeaseResult<&WorkerInfo> {
        self.workers
            .get(worker_id)
            .ok_or_else(|| LeaseError::worker_not_found(worker_id))
    }

    /// Removes a worker. The caller must release its job first.
    pub fn unregister(&mut self, worker_id: &WorkerId) -> Option<WorkerInfo> {
        let removed = self.workers.remove(worker_id);
        if removed.is_some() {
            info!(worker_id = %worker_id, "Worker unregistered");
        }
        removed
    }

    /// Get all registered workers, ordered by ID.
    pub fn all(&self) -> Vec<WorkerInfo> {
        let mut workers: Vec<WorkerInfo> = self.workers.values().cloned().collect();
        workers.sort_by(|a, b| a.id.cmp(&b.id));
        workers
    }

    /// Iterates over workers in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerInfo> {
        self.workers.values()
    }

    /// Removes idle workers last seen at or before `cutoff`.
    ///
    /// Workers holding a job are kept; their lease decides their fate.
    pub fn prune_idle(&mut self, cutoff: DateTime<Utc>) -> Vec<WorkerId> {
        let stale: Vec<WorkerId> = self
            .workers
            .values()
            .filter(|w| w.is_idle() && w.last_seen_at <= cutoff)
            .map(|w| w.id.clone())
            .collect();

        for id in &stale {
            self.workers.remove(id);
            info!(worker_id = %id, "Removed idle worker");
        }

        stale
    }

    /// Increment completed count for a worker.
    pub fn record_job_completed(&mut self, worker_id: &WorkerId) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.jobs_completed += 1;
        }
    }

    /// Increment failed count for a worker.
    pub fn record_job_failed(&mut self, worker_id: &WorkerId) {
        if let Some(worker) = self.workers.get_mut(worker_id) {
            worker.jobs_failed += 1;
        }
    }

    /// Number of known workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true if no worker is known.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Number of workers holding a job.
    pub fn busy_count(&self) -> usize {
        self.workers.values().filter(|w| !w.is_idle()).count()
    }

    /// Get total registration count.
    pub fn total_registrations(&self) -> u64 {
        self.registration_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn id(s: &str) -> WorkerId {
        WorkerId::parse(s).unwrap()
    }

    #[test]
    fn test_worker_registration() {
        let mut registry = WorkerRegistry::new();
        let t0 = Utc::now();

        assert!(registry.register(&id("worker-1"), t0));
        assert!(registry.register(&id("worker-2"), t0));

        let t1 = t0 + TimeDelta::seconds(2);
        assert!(!registry.register(&id("worker-1"), t1));

        let worker = registry.get(&id("worker-1")).unwrap();
        assert_eq!(worker.registered_at, t0);
        assert_eq!(worker.last_seen_at, t1);
        assert_eq!(registry.total_registrations(), 2);
        assert!(registry.get(&id("worker-3")).is_err());
    }

    #[test]
    fn test_touch_auto_registers() {
        let mut registry = WorkerRegistry::new();
        let now = Utc::now();

        let worker = registry.touch(&id("ext-1"), now);
        assert_eq!(worker.last_seen_at, now);
        assert!(worker.is_idle());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.total_registrations(), 1);

        let later = now + TimeDelta::seconds(1);
        assert_eq!(registry.touch(&id("ext-1"), later).registered_at, now);
        assert_eq!(registry.total_registrations(), 1);
        assert!(!registry.register(&id("ext-1"), later));
    }

    #[test]
    fn test_current_job_tracking() {
        let mut registry = WorkerRegistry::new();
        let key = JobKey::new("PM1", "AAA").unwrap();
        let other = JobKey::new("PM2", "BBB").unwrap();
        registry.register(&id("w1"), Utc::now());

        registry.set_current_job(&id("w1"), Some(key.clone())).unwrap();
        assert_eq!(registry.busy_count(), 1);

        registry.release_job(&id("w1"), &other);
        assert_eq!(registry.get(&id("w1")).unwrap().current_job, Some(key.clone()));

        registry.release_job(&id("w1"), &key);
        assert!(registry.get(&id("w1")).unwrap().is_idle());

        assert!(registry.set_current_job(&id("ghost"), None).is_err());
    }

    #[test]
    fn test_prune_idle_keeps_busy_workers() {
        let mut registry = WorkerRegistry::new();
        let t0 = Utc::now();
        registry.register(&id("idle"), t0);
        registry.register(&id("busy"), t0);
        registry.register(&id("fresh"), t0 + TimeDelta::seconds(10));
        registry
            .set_current_job(&id("busy"), Some(JobKey::new("PM1", "AAA").unwrap()))
            .unwrap();

        let pruned = registry.prune_idle(t0 + TimeDelta::seconds(5));
        assert_eq!(pruned, vec![id("idle")]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister_and_listing() {
        let mut registry = WorkerRegistry::new();
        let now = Utc::now();
        registry.register(&id("b"), now);
        registry.register(&id("a"), now);

        let ids: Vec<_> = registry.all().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![id("a"), id("b")]);

        assert!(registry.unregister(&id("a")).is_some());
        assert!(registry.unregister(&id("a")).is_none());
    }

    #[test]
    fn test_job_recording() {
        let mut registry = WorkerRegistry::new();
        registry.register(&id("worker-1"), Utc::now());

        registry.record_job_completed(&id("worker-1"));
        registry.record_job_completed(&id("worker-1"));
        registry.record_job_failed(&id("worker-1"));

        let worker = registry.get(&id("worker-1")).unwrap();
        assert_eq!(worker.jobs_completed, 2);
        assert_eq!(worker.jobs_failed, 1);
    }

    #[test]
    fn test_worker_info_serializes_camel_case() {
        let mut registry = WorkerRegistry::new();
        registry.register(&id("w1"), Utc::now());
        let json = serde_json::to_value(registry.get(&id("w1")).unwrap()).unwrap();
        assert_eq!(json["id"], "w1");
        assert!(json["currentJob"].is_null());
        assert_eq!(json["jobsCompleted"], 0);
    }
}
