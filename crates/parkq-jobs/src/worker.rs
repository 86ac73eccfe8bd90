//! In-process worker driving a [`LookupExecutor`] through the gateway.
//!
//! Follows the same protocol as a remote worker: poll for work, heartbeat
//! while the lookup runs, report the outcome. Losing the lease cancels the
//! lookup.

use crate::config::{tick_period, LeaseConfig};
use crate::error::{LeaseError, LeaseResult, LookupError};
use crate::executor::LookupExecutor;
use crate::gateway::{LeaseGateway, LookupOutcome};
use crate::job::JobStatus;
use crate::key::{JobKey, WorkerId};
use crate::metrics::WorkerMetrics;
use crate::scheduler::WorkOffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument};

/// Worker timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseWorkerConfig {
    /// Wait between polls when no work is available.
    pub poll_interval: Duration,

    /// Heartbeat period while a lookup runs.
    pub heartbeat_interval: Duration,

    /// Upper bound on a single lookup.
    pub lookup_timeout: Duration,
}

impl Default for LeaseWorkerConfig {
    fn default() -> Self {
        Self::from(&LeaseConfig::default())
    }
}

impl From<&LeaseConfig> for LeaseWorkerConfig {
    fn from(config: &LeaseConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            heartbeat_interval: config.heartbeat_interval,
            lookup_timeout: config.lookup_timeout,
        }
    }
}

/// Worker statistics.
#[derive(Debug, Clone)]
pub struct LeaseWorkerStats {
    /// Worker ID.
    pub id: String,

    /// Is running.
    pub running: bool,

    /// Jobs completed.
    pub jobs_completed: u64,

    /// Jobs failed.
    pub jobs_failed: u64,

    /// Leases lost mid-lookup.
    pub leases_lost: u64,
}

/// Single-job worker loop.
pub struct LeaseWorker<E: LookupExecutor> {
    /// Worker identity presented to the gateway.
    id: WorkerId,

    /// Queue entry point.
    gateway: LeaseGateway,

    /// Lookup implementation.
    executor: Arc<E>,

    /// Timing.
    config: LeaseWorkerConfig,

    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,

    /// Running flag.
    running: Arc<AtomicBool>,

    /// Jobs completed counter.
    jobs_completed: Arc<AtomicU64>,

    /// Jobs failed counter.
    jobs_failed: Arc<AtomicU64>,

    /// Leases lost counter.
    leases_lost: Arc<AtomicU64>,
}

impl<E: LookupExecutor + 'static> LeaseWorker<E> {
    /// Create a worker. Timing comes from the gateway's lease configuration.
    pub fn new(id: WorkerId, gateway: LeaseGateway, executor: Arc<E>) -> Self {
        let config = LeaseWorkerConfig::from(gateway.config());
        Self::with_config(id, gateway, executor, config)
    }

    /// Create a worker with explicit timing.
    pub fn with_config(
        id: WorkerId,
        gateway: LeaseGateway,
        executor: Arc<E>,
        config: LeaseWorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            id,
            gateway,
            executor,
            config,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            jobs_completed: Arc::new(AtomicU64::new(0)),
            jobs_failed: Arc::new(AtomicU64::new(0)),
            leases_lost: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Polls once and, if a job is leased, runs it to completion.
    ///
    /// Returns the status recorded for the job, or None if there was nothing
    /// to do or the lease was lost before the result was accepted.
    pub async fn run_once(&self) -> LeaseResult<Option<JobStatus>> {
        let job = match self.gateway.request_work(self.id.as_str())? {
            WorkOffer::Assigned(job) => job,
            WorkOffer::Busy(key) => {
                warn!(worker_id = %self.id, key = %key, "Gateway reports a job this worker is not running");
                return Ok(None);
            }
            WorkOffer::NoneAvailable => return Ok(None),
        };
        let key = job.key().clone();
        debug!(worker_id = %self.id, key = %key, "Processing job");

        let started = Instant::now();
        let Some(outcome) = self.perform_with_heartbeat(&key).await else {
            self.leases_lost.fetch_add(1, Ordering::Relaxed);
            WorkerMetrics::lookup_duration(self.id.as_str(), "lost", started.elapsed());
            return Ok(None);
        };

        let label = match &outcome {
            LookupOutcome::Success(_) => "completed",
            LookupOutcome::Error(_) => "failed",
        };
        WorkerMetrics::lookup_duration(self.id.as_str(), label, started.elapsed());

        let status = match self.gateway.submit_result(
            self.id.as_str(),
            key.ticket_num(),
            key.plate_num(),
            outcome,
        ) {
            Ok(status) => status,
            Err(LeaseError::NotOwner { .. }) => {
                self.leases_lost.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id = %self.id, key = %key, "Result rejected, lease was lost");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match status {
            JobStatus::Completed => self.jobs_completed.fetch_add(1, Ordering::Relaxed),
            _ => self.jobs_failed.fetch_add(1, Ordering::Relaxed),
        };
        Ok(Some(status))
    }

    /// Runs the lookup, renewing the lease every heartbeat interval. Returns
    /// None if a heartbeat is refused.
    async fn perform_with_heartbeat(&self, key: &JobKey) -> Option<LookupOutcome> {
        let lookup = timeout(self.config.lookup_timeout, self.executor.perform(key));
        tokio::pin!(lookup);

        let period = tick_period(self.config.heartbeat_interval);
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = &mut lookup => {
                    return Some(match result {
                        Ok(Ok(value)) => LookupOutcome::Success(value),
                        Ok(Err(e)) => {
                            warn!(worker_id = %self.id, key = %key, error = %e, "Lookup failed");
                            LookupOutcome::Error(e.to_string())
                        }
                        Err(_) => {
                            let e = LookupError::TimedOut(self.config.lookup_timeout);
                            warn!(worker_id = %self.id, key = %key, error = %e, "Lookup timed out");
                            LookupOutcome::Error(e.to_string())
                        }
                    });
                }

                _ = heartbeat.tick() => {
                    if let Err(e) = self.gateway.heartbeat(
                        self.id.as_str(),
                        key.ticket_num(),
                        key.plate_num(),
                    ) {
                        warn!(worker_id = %self.id, key = %key, error = %e, "Heartbeat refused, abandoning lookup");
                        return None;
                    }
                }
            }
        }
    }

    /// Start the worker loop. Returns once [`stop`](Self::stop) is called;
    /// any lease still held is released through the disconnect path.
    pub async fn start(&self) -> LeaseResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(LeaseError::Conflict(format!(
                "Worker {} already running",
                self.id
            )));
        }

        info!(
            worker_id = %self.id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            lookup_timeout_secs = self.config.lookup_timeout.as_secs(),
            "Starting lease worker"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let span = tracing::info_span!("lease_worker", worker_id = %self.id);

        async {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(worker_id = %self.id, "Received shutdown signal");
                        break;
                    }

                    result = self.run_once() => match result {
                        // Straight back for more work.
                        Ok(Some(_)) => continue,
                        Ok(None) => {}
                        Err(e) => error!(worker_id = %self.id, error = %e, "Polling failed"),
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(worker_id = %self.id, "Received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(tick_period(self.config.poll_interval)) => {}
                }
            }
        }
        .instrument(span)
        .await;

        match self.gateway.disconnect(self.id.as_str()) {
            Ok(Some(key)) => info!(worker_id = %self.id, key = %key, "Released lease on shutdown"),
            Ok(None) => {}
            Err(e) => error!(worker_id = %self.id, error = %e, "Failed to disconnect worker"),
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            worker_id = %self.id,
            completed = self.jobs_completed(),
            failed = self.jobs_failed(),
            "Lease worker stopped"
        );

        Ok(())
    }

    /// Stop the worker.
    pub fn stop(&self) {
        info!(worker_id = %self.id, "Stopping lease worker...");
        let _ = self.shutdown_tx.send(());
    }

    /// Check if the worker loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the number of jobs completed.
    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    /// Get the number of jobs failed.
    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Get the worker ID.
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Get worker statistics.
    pub fn stats(&self) -> LeaseWorkerStats {
        LeaseWorkerStats {
            id: self.id.to_string(),
            running: self.is_running(),
            jobs_completed: self.jobs_completed(),
            jobs_failed: self.jobs_failed(),
            leases_lost: self.leases_lost.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Executor that sleeps, then answers from the key.
    struct FakeExecutor {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl LookupExecutor for FakeExecutor {
        async fn perform(&self, key: &JobKey) -> Result<Value, LookupError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(LookupError::Failed("captcha rejected".into()))
            } else {
                Ok(json!({ "ticket": key.ticket_num(), "amount": "30.00" }))
            }
        }
    }

    fn fast_config() -> LeaseConfig {
        let mut config = LeaseConfig::default();
        config.lease_timeout = Duration::from_millis(200);
        config.heartbeat_interval = Duration::from_millis(40);
        config.sweep_interval = Duration::from_millis(20);
        config.poll_interval = Duration::from_millis(10);
        config.lookup_timeout = Duration::from_secs(5);
        config
    }

    fn worker(gateway: &LeaseGateway, delay_ms: u64, fail: bool) -> LeaseWorker<FakeExecutor> {
        LeaseWorker::new(
            WorkerId::parse("local-1").unwrap(),
            gateway.clone(),
            Arc::new(FakeExecutor {
                delay: Duration::from_millis(delay_ms),
                fail,
            }),
        )
    }

    #[test]
    fn test_worker_config_from_lease_config() {
        let config = LeaseWorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.lookup_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_run_once_idle() {
        let gateway = LeaseGateway::new(fast_config());
        let worker = worker(&gateway, 0, false);
        assert_eq!(tokio_test::assert_ok!(worker.run_once().await), None);
        assert_eq!(gateway.workers().len(), 1);
    }

    #[tokio::test]
    async fn test_run_once_completes() {
        let gateway = LeaseGateway::new(fast_config());
        gateway.enqueue("PM451052", "CZCL340").unwrap();
        let worker = worker(&gateway, 10, false);

        assert_eq!(worker.run_once().await.unwrap(), Some(JobStatus::Completed));
        assert_eq!(worker.jobs_completed(), 1);

        let job = gateway.status("PM451052", "CZCL340").unwrap();
        assert_eq!(job.result().unwrap()["ticket"], "PM451052");
    }

    #[tokio::test]
    async fn test_run_once_records_failure() {
        let gateway = LeaseGateway::new(fast_config());
        gateway.enqueue("PM1", "AAA").unwrap();
        let worker = worker(&gateway, 0, true);

        assert_eq!(worker.run_once().await.unwrap(), Some(JobStatus::Failed));
        let job = gateway.status("PM1", "AAA").unwrap();
        assert_eq!(
            job.result().unwrap()["error"],
            "Lookup failed: captcha rejected"
        );
    }

    #[tokio::test]
    async fn test_lookup_timeout_fails_job() {
        let mut config = fast_config();
        config.lookup_timeout = Duration::from_millis(50);
        let gateway = LeaseGateway::new(config);
        gateway.enqueue("PM1", "AAA").unwrap();
        let worker = worker(&gateway, 1_000, false);

        assert_eq!(worker.run_once().await.unwrap(), Some(JobStatus::Failed));
        assert_eq!(worker.jobs_failed(), 1);
    }

    #[tokio::test]
    async fn test_zero_heartbeat_interval_still_completes() {
        let gateway = LeaseGateway::new(fast_config());
        gateway.enqueue("PM1", "AAA").unwrap();
        let config = LeaseWorkerConfig {
            heartbeat_interval: Duration::ZERO,
            ..LeaseWorkerConfig::from(gateway.config())
        };
        let worker = LeaseWorker::with_config(
            WorkerId::parse("local-1").unwrap(),
            gateway.clone(),
            Arc::new(FakeExecutor {
                delay: Duration::from_millis(20),
                fail: false,
            }),
            config,
        );

        assert_eq!(worker.run_once().await.unwrap(), Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_heartbeats_outlast_lease() {
        let gateway = LeaseGateway::new(fast_config());
        let monitor = Arc::new(gateway.lease_monitor());
        let sweeper = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start().await })
        };

        gateway.enqueue("PM1", "AAA").unwrap();
        // Lookup runs for three lease lengths.
        let worker = worker(&gateway, 600, false);
        assert_eq!(worker.run_once().await.unwrap(), Some(JobStatus::Completed));
        assert_eq!(monitor.reclaimed_total(), 0);

        monitor.stop();
        sweeper.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_start_and_stop_releases_lease() {
        let gateway = LeaseGateway::new(fast_config());
        gateway.enqueue("PM1", "AAA").unwrap();
        gateway.enqueue("PM2", "AAA").unwrap();

        let worker = Arc::new(worker(&gateway, 10_000, false));
        let task = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.start().await })
        };

        for _ in 0..100 {
            if gateway.stats().busy_workers == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(worker.is_running());

        worker.stop();
        task.await.unwrap().unwrap();
        assert!(!worker.is_running());
        assert!(gateway.workers().is_empty());
        assert_eq!(gateway.pending().len(), 2);
    }
}
