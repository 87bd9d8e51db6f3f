//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_invocations_total` (counter): invocations by status
//! - `gateway_invocation_duration_seconds` (histogram): latency distribution
//! - `gateway_health_probe_failures_total` (counter): failed liveness probes
//! - `gateway_worker_restarts_total` (counter): background worker restarts
//! - `gateway_persisted_objects_total` (counter): objects written to the blob store

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_invocation(status: u16, start: Instant) {
    counter!("gateway_invocations_total", "status" => status.to_string()).increment(1);
    histogram!("gateway_invocation_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_probe_failure() {
    counter!("gateway_health_probe_failures_total").increment(1);
}

pub fn record_restart() {
    counter!("gateway_worker_restarts_total").increment(1);
}

pub fn record_persisted(bytes: usize) {
    counter!("gateway_persisted_objects_total").increment(1);
    counter!("gateway_persisted_bytes_total").increment(bytes as u64);
}
