//! Server startup utilities.

use parkq_config::{AppConfig, LogFormat};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},parkq=debug,tower_http=debug")));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Prints the startup banner.
pub fn print_banner() {
    info!(r#"
                    __
    ____  ____ ______/ /______ _
   / __ \/ __ `/ ___/ //_/ __ `/
  / /_/ / /_/ / /  / ,< / /_/ /
 / .___/\__,_/_/  /_/|_|\__, /
/_/                       /_/
    "#);
}

/// Prints server startup information.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    let base = format!("http://{}", config.server.addr());
    info!("{}", separator);
    info!("REST API:  {}/api/v1", base);
    info!("Health:    {}/health", base);
    info!("API Docs:  {}/swagger-ui", base);
    if config.observability.metrics_enabled {
        info!("Metrics:   {}{}", base, config.observability.metrics_path);
    }
    info!(
        "Lease:     {}s timeout, {}s heartbeat, {} on expiry",
        config.lease.lease_timeout_secs,
        config.lease.heartbeat_interval_secs,
        config.lease.timeout_policy
    );
    info!("{}", separator);
}
