//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sidecar_failures_total` (counter): failed sidecar probes
//! - `sidecar_failure_count` (gauge): failures inside the current window
//! - `sidecar_breaker_open` (gauge): 1=open, 0=closed
//! - `sidecar_restart_backoff_seconds` (gauge): delay before next restart
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::sidecar::SupervisorStatus;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_sidecar_failure() {
    metrics::counter!("sidecar_failures_total").increment(1);
}

pub fn record_sidecar_status(status: &SupervisorStatus) {
    metrics::gauge!("sidecar_failure_count").set(f64::from(status.failure_count));
    metrics::gauge!("sidecar_breaker_open").set(if status.breaker_open { 1.0 } else { 0.0 });
    metrics::gauge!("sidecar_restart_backoff_seconds").set(status.current_backoff.as_secs_f64());
}
