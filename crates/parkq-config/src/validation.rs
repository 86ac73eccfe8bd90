//! Configuration validation module.
//!
//! Checks every section and reports all problems at once so a bad
//! deployment fails at start-up instead of reclaiming healthy leases later.

use crate::AppConfig;
use std::fmt;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Port number is invalid (must be 1-65535).
    InvalidPort { name: String, value: u16 },
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Heartbeats must arrive several times within one lease.
    LeaseNotLongerThanHeartbeat { lease_secs: u64, heartbeat_secs: u64 },
    /// The reaper must run more often than a lease lasts.
    SweepNotShorterThanLease { sweep_ms: u64, lease_secs: u64 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Metrics path must be absolute.
    InvalidMetricsPath { value: String },
    /// Metrics path collides with a built-in route.
    ReservedMetricsPath { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort { name, value } => {
                write!(f, "Invalid port for {}: {} (must be 1-65535)", name, value)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::LeaseNotLongerThanHeartbeat {
                lease_secs,
                heartbeat_secs,
            } => {
                write!(
                    f,
                    "Lease timeout ({}s) must be greater than heartbeat interval ({}s)",
                    lease_secs, heartbeat_secs
                )
            }
            Self::SweepNotShorterThanLease {
                sweep_ms,
                lease_secs,
            } => {
                write!(
                    f,
                    "Sweep interval ({}ms) must be shorter than lease timeout ({}s)",
                    sweep_ms, lease_secs
                )
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::InvalidMetricsPath { value } => {
                write!(f, "Metrics path must start with '/': '{}'", value)
            }
            Self::ReservedMetricsPath { value } => {
                write!(f, "Metrics path '{}' is already served by the API", value)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Routes owned by the HTTP server.
    const RESERVED_ROUTES: &'static [&'static str] = &["/", "/health", "/ready", "/live"];

    /// Route prefixes owned by the HTTP server.
    const RESERVED_PREFIXES: &'static [&'static str] = &["/api/v1", "/swagger-ui", "/api-docs"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&config.server, &mut errors);
        Self::validate_lease(&config.lease, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(config: &crate::ServerConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.port == 0 {
            errors.push(ConfigValidationError::InvalidPort {
                name: "server.port".to_string(),
                value: config.port,
            });
        }
        if config.request_timeout_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "server.request_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_lease(config: &crate::LeaseSettings, errors: &mut Vec<ConfigValidationError>) {
        let positive = [
            ("lease.lease_timeout_secs", config.lease_timeout_secs),
            ("lease.heartbeat_interval_secs", config.heartbeat_interval_secs),
            ("lease.sweep_interval_ms", config.sweep_interval_ms),
            ("lease.poll_interval_ms", config.poll_interval_ms),
            ("lease.lookup_timeout_secs", config.lookup_timeout_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                errors.push(ConfigValidationError::NonPositiveTimeout {
                    name: name.to_string(),
                    value,
                });
            }
        }

        if config.lease_timeout_secs <= config.heartbeat_interval_secs {
            errors.push(ConfigValidationError::LeaseNotLongerThanHeartbeat {
                lease_secs: config.lease_timeout_secs,
                heartbeat_secs: config.heartbeat_interval_secs,
            });
        }

        if config.sweep_interval_ms >= config.lease_timeout_secs.saturating_mul(1000) {
            errors.push(ConfigValidationError::SweepNotShorterThanLease {
                sweep_ms: config.sweep_interval_ms,
                lease_secs: config.lease_timeout_secs,
            });
        }
    }

    fn validate_observability(
        config: &crate::ObservabilityConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }

        if !config.metrics_enabled {
            return;
        }
        let path = config.metrics_path.as_str();
        if !path.starts_with('/') {
            errors.push(ConfigValidationError::InvalidMetricsPath {
                value: path.to_string(),
            });
        } else if Self::is_reserved_route(path) {
            errors.push(ConfigValidationError::ReservedMetricsPath {
                value: path.to_string(),
            });
        }
    }

    fn is_reserved_route(path: &str) -> bool {
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Self::RESERVED_ROUTES.contains(&path)
            || Self::RESERVED_PREFIXES.iter().any(|prefix| {
                path.strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidPort { .. })));
    }

    #[test]
    fn test_lease_must_exceed_heartbeat() {
        let mut config = AppConfig::default();
        config.lease.lease_timeout_secs = 2;
        config.lease.heartbeat_interval_secs = 2;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.contains(&ConfigValidationError::LeaseNotLongerThanHeartbeat {
            lease_secs: 2,
            heartbeat_secs: 2,
        }));
    }

    #[test]
    fn test_sweep_must_be_shorter_than_lease() {
        let mut config = AppConfig::default();
        config.lease.sweep_interval_ms = 5000;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::SweepNotShorterThanLease {
                sweep_ms: 5000,
                lease_secs: 5,
            }]
        );
    }

    #[test]
    fn test_zero_lease_reports_every_problem() {
        let mut config = AppConfig::default();
        config.lease.lease_timeout_secs = 0;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = AppConfig::default();
        config.observability.log_level = "verbose".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors[0].to_string().contains("verbose"));
    }

    #[test]
    fn test_metrics_path_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.observability.metrics_path = "metrics".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        config.observability.metrics_enabled = false;
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_metrics_path_must_not_shadow_api_routes() {
        let mut config = AppConfig::default();
        for path in ["/", "/health", "/live/", "/api/v1", "/api/v1/stats", "/swagger-ui/index.html"] {
            config.observability.metrics_path = path.to_string();
            assert_eq!(
                ConfigValidator::validate(&config).unwrap_err(),
                vec![ConfigValidationError::ReservedMetricsPath {
                    value: path.to_string()
                }],
                "{path}"
            );
        }

        for path in ["/metrics", "/api/v10", "/healthz"] {
            config.observability.metrics_path = path.to_string();
            assert!(ConfigValidator::validate(&config).is_ok(), "{path}");
        }
    }
}
