//! Configuration loader with layered sources.

use crate::{AppConfig, ConfigValidator};
use config::{Config, ConfigError, Environment, File};
use parkq_core::ParkqError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Environment variable selecting the `config/{environment}.toml` layer.
pub const ENVIRONMENT_VAR: &str = "PARKQ_ENVIRONMENT";

/// Layered configuration loader.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Local overrides
    /// 4. Environment variables of the form `PARKQ__SECTION__KEY` (`PARKQ__LEASE__LEASE_TIMEOUT_SECS=10`)
    ///
    /// Missing files are skipped; the result is validated before it is returned.
    pub fn new(config_dir: impl AsRef<Path>) -> Result<Self, ParkqError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var(ENVIRONMENT_VAR).unwrap_or_else(|_| "development".to_string());
        Self::with_environment(config_dir, environment)
    }

    /// Creates a loader for an explicit environment name.
    pub fn with_environment(
        config_dir: impl AsRef<Path>,
        environment: impl Into<String>,
    ) -> Result<Self, ParkqError> {
        let config = Self::load_config(config_dir.as_ref(), &environment.into())?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, ParkqError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    fn load_config(config_dir: &Path, environment: &str) -> Result<AppConfig, ParkqError> {
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for layer in ["default", environment, "local"] {
            let path = config_dir.join(format!("{}.toml", layer));
            if path.exists() {
                debug!("Loading {} config from: {}", layer, path.display());
                builder = builder.add_source(File::from(path.as_path()).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PARKQ")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error_to_parkq_error)?;

        ConfigValidator::validate(&app_config).map_err(|errors| {
            ParkqError::Configuration(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        Ok(app_config)
    }
}

fn config_error_to_parkq_error(err: ConfigError) -> ParkqError {
    ParkqError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DuplicatePolicy, TimeoutPolicy};
    use std::fs;

    #[tokio::test]
    async fn test_missing_directory_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_environment(dir.path().join("absent"), "test").unwrap();
        let config = loader.get().await;
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.lease.lease_timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_environment_layer_overrides_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[lease]\nlease_timeout_secs = 10\ntimeout_policy = \"drop\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.toml"),
            "[lease]\nlease_timeout_secs = 20\nduplicate_policy = \"reject\"\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_environment(dir.path(), "staging").unwrap();
        let config = loader.get().await;
        assert_eq!(config.lease.lease_timeout_secs, 20);
        assert_eq!(config.lease.timeout_policy, TimeoutPolicy::Drop);
        assert_eq!(config.lease.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.lease.heartbeat_interval_secs, 1);
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[lease]\nlease_timeout_secs = 1\nheartbeat_interval_secs = 1\n",
        )
        .unwrap();

        let err = ConfigLoader::with_environment(dir.path(), "test")
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("heartbeat"));
    }

    #[tokio::test]
    async fn test_env_variables_override_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.toml"), "[lease]\nmax_jobs = 5\n").unwrap();

        std::env::set_var("PARKQ__LEASE__MAX_JOBS", "77");
        let loaded = ConfigLoader::with_environment(dir.path(), "test");
        std::env::remove_var("PARKQ__LEASE__MAX_JOBS");

        assert_eq!(loaded.unwrap().get().await.lease.max_jobs, 77);
    }

    #[test]
    fn test_shipped_defaults_match_code() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let shipped: AppConfig = toml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let code = AppConfig::default();

        assert_eq!(shipped.server.port, code.server.port);
        assert_eq!(
            toml::to_string(&shipped.lease).unwrap(),
            toml::to_string(&code.lease).unwrap()
        );
        assert_eq!(shipped.observability.metrics_path, code.observability.metrics_path);
    }
}
