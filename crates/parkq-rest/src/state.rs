//! Application state for Axum handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use parkq_jobs::LeaseGateway;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: LeaseGateway,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(gateway: LeaseGateway) -> Self {
        Self {
            gateway,
            metrics: None,
        }
    }

    /// Attaches the Prometheus handle rendered by the metrics endpoint.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
