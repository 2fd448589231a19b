//! System-level routes: liveness and metrics.

pub mod health_check;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::InnerState;

#[tracing::instrument(name = "create_system_router")]
pub fn create_system_router() -> Router<InnerState> {
    tracing::info!("Creating system router");

    Router::new().route("/health", get(health_check::health_check))
}

/// `/metrics` in the Prometheus text format.
pub fn create_metrics_router(metric_handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(|| async move { metric_handle.render() }))
}
