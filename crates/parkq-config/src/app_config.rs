//! Application configuration structures.

use crate::{DuplicatePolicy, LogFormat, TimeoutPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Lease, reaper and enqueue behaviour.
    #[serde(default)]
    pub lease: LeaseSettings,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "parkq".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable CORS.
    pub cors_enabled: bool,
    /// CORS allowed origins.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: 30,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Returns the bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Lease coordination settings.
///
/// The lease must outlive several heartbeat intervals and the reaper must
/// sweep more often than a lease lasts; `ConfigValidator` enforces both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseSettings {
    /// How long an assignment stays valid without a heartbeat.
    pub lease_timeout_secs: u64,
    /// Heartbeat cadence workers are told to use.
    pub heartbeat_interval_secs: u64,
    /// Reaper period in milliseconds.
    pub sweep_interval_ms: u64,
    /// Worker poll cadence when no work is available.
    pub poll_interval_ms: u64,
    /// Upper bound for one lookup run by an in-process worker.
    pub lookup_timeout_secs: u64,
    /// What happens to a job whose lease expired.
    pub timeout_policy: TimeoutPolicy,
    /// How enqueue treats an existing key.
    pub duplicate_policy: DuplicatePolicy,
    /// Maximum resident job records (0 = unlimited).
    pub max_jobs: usize,
    /// Unread terminal results are purged after this many seconds (0 = never).
    pub result_retention_secs: u64,
    /// Idle workers not seen for this long are forgotten (0 = never).
    pub worker_idle_timeout_secs: u64,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            lease_timeout_secs: 5,
            heartbeat_interval_secs: 1,
            sweep_interval_ms: 1000,
            poll_interval_ms: 1000,
            lookup_timeout_secs: 30,
            timeout_policy: TimeoutPolicy::Requeue,
            duplicate_policy: DuplicatePolicy::Ignore,
            max_jobs: 0,
            result_retention_secs: 3600,
            worker_idle_timeout_secs: 300,
        }
    }
}

impl LeaseSettings {
    /// Returns the lease timeout as a Duration.
    #[must_use]
    pub const fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    /// Returns the heartbeat interval as a Duration.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Returns the reaper period as a Duration.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Returns the poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the lookup timeout as a Duration.
    #[must_use]
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format.
    pub log_format: LogFormat,
    /// Enable the Prometheus recorder.
    pub metrics_enabled: bool,
    /// Metrics endpoint path.
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_path: "/metrics".to_string(),
        }
    }
}
