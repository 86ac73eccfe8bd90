//! Application assembly.

use metrics_exporter_prometheus::PrometheusHandle;
use parkq_config::AppConfig;
use parkq_core::{ParkqError, ParkqResult};
use parkq_jobs::{LeaseConfig, LeaseGateway, LeaseMonitor};
use parkq_rest::{create_router, AppState};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Queue, reaper and router built from one configuration.
pub struct App {
    config: AppConfig,
    gateway: LeaseGateway,
    monitor: Arc<LeaseMonitor>,
    metrics: Option<PrometheusHandle>,
}

impl App {
    /// Builds the application. `metrics` is rendered by the metrics endpoint
    /// when present.
    pub fn new(config: AppConfig, metrics: Option<PrometheusHandle>) -> Self {
        let lease_config = LeaseConfig::from(&config.lease);
        let gateway = LeaseGateway::new(lease_config);
        let monitor = Arc::new(gateway.lease_monitor());

        Self {
            config,
            gateway,
            monitor,
            metrics,
        }
    }

    /// Returns the queue entry point.
    pub fn gateway(&self) -> &LeaseGateway {
        &self.gateway
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> axum::Router {
        let mut state = AppState::new(self.gateway.clone());
        if let Some(handle) = &self.metrics {
            state = state.with_metrics(handle.clone());
        }
        create_router(state, &self.config.server, &self.config.observability)
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> ParkqResult<()> {
        let addr = self.config.server.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ParkqError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        info!("Starting REST server on http://{}", addr);
        self.serve(listener, shutdown).await
    }

    /// Serves on `listener` with the lease monitor running alongside. The
    /// monitor is stopped once the server has drained.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> ParkqResult<()> {
        let monitor_task = {
            let monitor = self.monitor.clone();
            tokio::spawn(async move {
                if let Err(e) = monitor.start().await {
                    error!(error = %e, "Lease monitor failed");
                }
            })
        };

        let router = self.router();
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ParkqError::internal(format!("REST server error: {}", e)));

        self.monitor.stop();
        if let Err(e) = monitor_task.await {
            error!(error = %e, "Lease monitor task panicked");
        }

        let stats = self.gateway.stats();
        info!(
            pending = stats.jobs.pending,
            assigned = stats.jobs.assigned,
            unread = stats.jobs.completed + stats.jobs.failed,
            "Server shutdown complete"
        );
        served
    }
}
