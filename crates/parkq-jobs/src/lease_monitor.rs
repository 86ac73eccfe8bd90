//! Periodic reaper for expired leases.

use crate::clock::Clock;
use crate::config::{tick_period, to_delta, LeaseConfig};
use crate::error::{LeaseError, LeaseResult};
use crate::key::{JobKey, WorkerId};
use crate::state::SharedLeaseState;
use crate::store::Reclaimed;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

/// Result of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Leases taken back.
    pub reclaimed: Vec<Reclaimed>,
    /// Unread results dropped after the retention period.
    pub purged_results: Vec<JobKey>,
    /// Idle workers forgotten.
    pub pruned_workers: Vec<WorkerId>,
}

impl SweepReport {
    /// Returns true if the sweep changed nothing.
    pub fn is_empty(&self) -> bool {
        self.reclaimed.is_empty() && self.purged_results.is_empty() && self.pruned_workers.is_empty()
    }
}

/// Reaper task reclaiming leases whose deadline has passed.
///
/// Runs independently of request traffic; each tick takes the state lock
/// once and applies the configured timeout policy.
pub struct LeaseMonitor {
    /// Unique monitor ID.
    id: String,

    /// Shared queue state.
    state: SharedLeaseState,

    /// Time source.
    clock: Arc<dyn Clock>,

    /// Lease configuration.
    config: LeaseConfig,

    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,

    /// Running flag.
    running: Arc<AtomicBool>,

    /// Leases reclaimed since start.
    reclaimed_total: Arc<AtomicU64>,
}

impl LeaseMonitor {
    /// Create a monitor over `state`.
    pub fn new(state: SharedLeaseState, clock: Arc<dyn Clock>, config: LeaseConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            id: format!("lease-monitor-{}", Uuid::new_v4()),
            state,
            clock,
            config,
            shutdown_tx,
            running: Arc::new(AtomicBool::new(false)),
            reclaimed_total: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Runs one sweep: expired leases first, then result retention and idle
    /// worker pruning.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let reclaimed = state.reclaim_expired(now, self.config.timeout_policy);

        let purged_results = match self.config.result_retention {
            Some(retention) => state.jobs.purge_terminal(cutoff(now, retention)),
            None => Vec::new(),
        };

        let pruned_workers = match self.config.worker_idle_timeout {
            Some(idle) => state.workers.prune_idle(cutoff(now, idle)),
            None => Vec::new(),
        };

        if !purged_results.is_empty() || !pruned_workers.is_empty() {
            state.publish_sizes();
        }
        drop(state);

        self.reclaimed_total
            .fetch_add(reclaimed.len() as u64, Ordering::Relaxed);

        SweepReport {
            reclaimed,
            purged_results,
            pruned_workers,
        }
    }

    /// Start the monitor loop. Returns once [`stop`](Self::stop) is called.
    pub async fn start(&self) -> LeaseResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(LeaseError::Conflict(
                "Lease monitor already running".to_string(),
            ));
        }

        info!(
            monitor_id = %self.id,
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            lease_timeout_secs = self.config.lease_timeout.as_secs(),
            policy = %self.config.timeout_policy,
            "Starting lease monitor"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(tick_period(self.config.sweep_interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(monitor_id = %self.id, "Received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    let report = self.sweep();
                    if !report.is_empty() {
                        debug!(
                            reclaimed = report.reclaimed.len(),
                            purged = report.purged_results.len(),
                            pruned = report.pruned_workers.len(),
                            "Sweep finished"
                        );
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            monitor_id = %self.id,
            reclaimed = self.reclaimed_total(),
            "Lease monitor stopped"
        );

        Ok(())
    }

    /// Stop the monitor.
    pub fn stop(&self) {
        info!(monitor_id = %self.id, "Stopping lease monitor...");
        let _ = self.shutdown_tx.send(());
    }

    /// Check if the monitor loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Leases reclaimed since the monitor was created.
    pub fn reclaimed_total(&self) -> u64 {
        self.reclaimed_total.load(Ordering::Relaxed)
    }

    /// Get the monitor ID.
    pub fn id(&self) -> &str {
        &self.id
    }
}

fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(to_delta(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
