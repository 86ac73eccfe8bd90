//! Runtime lease configuration.

use chrono::TimeDelta;
use parkq_config::{DuplicatePolicy, LeaseSettings, TimeoutPolicy};
use std::time::Duration;

/// Lease configuration used by the gateway, scheduler and monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// Lease length granted on assignment and on every heartbeat.
    pub lease_timeout: Duration,

    /// Heartbeat cadence expected from workers.
    pub heartbeat_interval: Duration,

    /// Reaper period.
    pub sweep_interval: Duration,

    /// Worker poll cadence when no job is available.
    pub poll_interval: Duration,

    /// Bound on a single lookup run by an in-process worker.
    pub lookup_timeout: Duration,

    /// What happens to an expired lease.
    pub timeout_policy: TimeoutPolicy,

    /// How enqueue treats existing keys.
    pub duplicate_policy: DuplicatePolicy,

    /// Resident job limit (0 = unlimited).
    pub max_jobs: usize,

    /// Unread results older than this are purged.
    pub result_retention: Option<Duration>,

    /// Idle workers unseen for this long are forgotten.
    pub worker_idle_timeout: Option<Duration>,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self::from(&LeaseSettings::default())
    }
}

impl From<&LeaseSettings> for LeaseConfig {
    fn from(settings: &LeaseSettings) -> Self {
        Self {
            lease_timeout: settings.lease_timeout(),
            heartbeat_interval: settings.heartbeat_interval(),
            sweep_interval: settings.sweep_interval(),
            poll_interval: settings.poll_interval(),
            lookup_timeout: settings.lookup_timeout(),
            timeout_policy: settings.timeout_policy,
            duplicate_policy: settings.duplicate_policy,
            max_jobs: settings.max_jobs,
            result_retention: non_zero_secs(settings.result_retention_secs),
            worker_idle_timeout: non_zero_secs(settings.worker_idle_timeout_secs),
        }
    }
}

impl LeaseConfig {
    /// Lease length as a chrono delta.
    pub fn lease(&self) -> TimeDelta {
        to_delta(self.lease_timeout)
    }

    /// Sets the timeout policy.
    #[must_use]
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Sets the duplicate policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Sets the resident job limit.
    #[must_use]
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }
}

/// Shortest period a background loop ticks at. Zero intervals in a
/// hand-built config are raised to this.
pub(crate) const MIN_TICK: Duration = Duration::from_millis(1);

/// Clamps a loop period to at least [`MIN_TICK`].
pub(crate) fn tick_period(period: Duration) -> Duration {
    period.max(MIN_TICK)
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Converts a std duration, saturating at the largest chrono delta.
pub(crate) fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
