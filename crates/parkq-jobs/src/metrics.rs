//! Prometheus metrics for lease queue monitoring.
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing for it.

use crate::store::JobCounts;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names for the lease queue.
pub mod names {
    /// Total jobs enqueued (new or restarted).
    pub const JOBS_ENQUEUED_TOTAL: &str = "parkq_jobs_enqueued_total";
    /// Total enqueue calls that found the key already resident.
    pub const JOBS_DUPLICATE_TOTAL: &str = "parkq_jobs_duplicate_total";
    /// Total leases granted.
    pub const JOBS_ASSIGNED_TOTAL: &str = "parkq_jobs_assigned_total";
    /// Total jobs completed successfully.
    pub const JOBS_COMPLETED_TOTAL: &str = "parkq_jobs_completed_total";
    /// Total jobs failed.
    pub const JOBS_FAILED_TOTAL: &str = "parkq_jobs_failed_total";
    /// Total leases taken back by the reaper.
    pub const LEASES_RECLAIMED_TOTAL: &str = "parkq_leases_reclaimed_total";
    /// Total heartbeats and results from non-owners.
    pub const STALE_REPORTS_TOTAL: &str = "parkq_stale_reports_total";
    /// Total leases released by a disconnect.
    pub const DISCONNECT_RELEASES_TOTAL: &str = "parkq_disconnect_releases_total";

    /// Current pending jobs.
    pub const JOBS_PENDING: &str = "parkq_jobs_pending";
    /// Current assigned jobs.
    pub const JOBS_ASSIGNED: &str = "parkq_jobs_assigned";
    /// Current unread results.
    pub const JOBS_UNREAD_RESULTS: &str = "parkq_jobs_unread_results";
    /// Known workers.
    pub const WORKERS_KNOWN: &str = "parkq_workers_known";

    /// Time from enqueue to assignment in seconds.
    pub const JOB_WAIT_TIME_SECONDS: &str = "parkq_job_wait_time_seconds";
    /// Lookup duration observed by in-process workers in seconds.
    pub const LOOKUP_DURATION_SECONDS: &str = "parkq_lookup_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::JOBS_ENQUEUED_TOTAL, "Total number of jobs enqueued");
    describe_counter!(
        names::JOBS_DUPLICATE_TOTAL,
        "Total number of enqueue calls for a resident key"
    );
    describe_counter!(names::JOBS_ASSIGNED_TOTAL, "Total number of leases granted");
    describe_counter!(
        names::JOBS_COMPLETED_TOTAL,
        "Total number of jobs completed successfully"
    );
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total number of jobs that failed");
    describe_counter!(
        names::LEASES_RECLAIMED_TOTAL,
        "Total number of expired leases reclaimed"
    );
    describe_counter!(
        names::STALE_REPORTS_TOTAL,
        "Total number of heartbeats or results rejected as not assigned"
    );
    describe_counter!(
        names::DISCONNECT_RELEASES_TOTAL,
        "Total number of leases released by worker disconnect"
    );

    describe_gauge!(names::JOBS_PENDING, "Current number of pending jobs");
    describe_gauge!(names::JOBS_ASSIGNED, "Current number of leased jobs");
    describe_gauge!(
        names::JOBS_UNREAD_RESULTS,
        "Current number of terminal results waiting to be read"
    );
    describe_gauge!(names::WORKERS_KNOWN, "Number of known workers");

    describe_histogram!(
        names::JOB_WAIT_TIME_SECONDS,
        "Time from enqueue to first assignment in seconds"
    );
    describe_histogram!(
        names::LOOKUP_DURATION_SECONDS,
        "Lookup duration in seconds"
    );
}

/// Queue metrics recorder.
#[derive(Clone)]
pub struct QueueMetrics;

impl QueueMetrics {
    /// Record a job enqueued.
    pub fn job_enqueued(restarted: bool) {
        counter!(
            names::JOBS_ENQUEUED_TOTAL,
            "restarted" => restarted.to_string()
        )
        .increment(1);
    }

    /// Record a duplicate enqueue.
    pub fn duplicate_enqueue(outcome: &'static str) {
        counter!(names::JOBS_DUPLICATE_TOTAL, "outcome" => outcome).increment(1);
    }

    /// Record a lease granted.
    pub fn job_assigned(wait_time: Duration, attempt: u32) {
        counter!(
            names::JOBS_ASSIGNED_TOTAL,
            "retry" => (attempt > 1).to_string()
        )
        .increment(1);

        if attempt == 1 {
            histogram!(names::JOB_WAIT_TIME_SECONDS).record(wait_time.as_secs_f64());
        }
    }

    /// Record a job completed.
    pub fn job_completed() {
        counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    }

    /// Record a job failed.
    pub fn job_failed() {
        counter!(names::JOBS_FAILED_TOTAL).increment(1);
    }

    /// Record an expired lease.
    pub fn lease_reclaimed(policy: &str) {
        counter!(
            names::LEASES_RECLAIMED_TOTAL,
            "policy" => policy.to_string()
        )
        .increment(1);
    }

    /// Record a rejected heartbeat or result.
    pub fn stale_report(operation: &'static str) {
        counter!(names::STALE_REPORTS_TOTAL, "operation" => operation).increment(1);
    }

    /// Record a lease released on disconnect.
    pub fn disconnect_release() {
        counter!(names::DISCONNECT_RELEASES_TOTAL).increment(1);
    }

    /// Update queue size gauges.
    pub fn update_queue_sizes(counts: &JobCounts, workers: usize) {
        gauge!(names::JOBS_PENDING).set(counts.pending as f64);
        gauge!(names::JOBS_ASSIGNED).set(counts.assigned as f64);
        gauge!(names::JOBS_UNREAD_RESULTS).set((counts.completed + counts.failed) as f64);
        gauge!(names::WORKERS_KNOWN).set(workers as f64);
    }
}

/// Worker metrics recorder.
#[derive(Clone)]
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Record how long a lookup took.
    pub fn lookup_duration(worker_id: &str, status: &'static str, duration: Duration) {
        histogram!(
            names::LOOKUP_DURATION_SECONDS,
            "worker_id" => worker_id.to_string(),
            "status" => status
        )
        .record(duration.as_secs_f64());
    }
}
