//! # Parkq Server
//!
//! Main entry point for the parkq lookup queue.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parkq_config::{AppConfig, ConfigLoader};
use parkq_core::{ParkqError, ParkqResult};
use parkq_server::{startup, App};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    startup::init_logging(&config.observability.log_level, config.observability.log_format);
    startup::print_banner();

    info!("Starting parkq server...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.environment);

    if let Err(e) = run(config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn load_config() -> ParkqResult<AppConfig> {
    let config_loader = ConfigLoader::from_default_location()?;
    Ok(config_loader.get().await)
}

async fn run(config: AppConfig) -> ParkqResult<()> {
    let metrics = if config.observability.metrics_enabled {
        Some(install_metrics_recorder()?)
    } else {
        warn!("Metrics disabled");
        None
    };

    startup::print_startup_info(&config);

    App::new(config, metrics).run(shutdown_signal()).await
}

fn install_metrics_recorder() -> ParkqResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ParkqError::Configuration(format!("Failed to install metrics recorder: {}", e)))?;
    parkq_jobs::register_metrics();
    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
