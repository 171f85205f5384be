//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, status
//! - `relay_request_duration_seconds` (histogram): request latency
//! - `relay_active_connections` (gauge): current connection count
//! - `relay_tunnels_opened_total` / `relay_tunnels_closed_total` (counters)
//! - `relay_tunnel_bytes_total` (counter): bytes piped by direction
//! - `relay_forward_failures_total` (counter): outbound failures by reason
//! - `relay_upgrades_total` (counter): handshake outcomes
//! - `relay_pipeline_errors_total` (counter): error-responder invocations

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on the given address.
///
/// Failure to install is logged, not fatal: the relay serves traffic
/// whether or not it is scraped.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(error) => tracing::error!(%error, "failed to install metrics exporter"),
    }
}

/// One completed HTTP request through the pipeline.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_connection_opened() {
    gauge!("relay_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("relay_active_connections").decrement(1.0);
}

pub fn record_tunnel_opened() {
    counter!("relay_tunnels_opened_total").increment(1);
}

pub fn record_tunnel_closed() {
    counter!("relay_tunnels_closed_total").increment(1);
}

/// Bytes piped by a tunnel over its lifetime, per direction.
pub fn record_tunnel_bytes(to_far: u64, to_near: u64) {
    counter!("relay_tunnel_bytes_total", "direction" => "to_far").increment(to_far);
    counter!("relay_tunnel_bytes_total", "direction" => "to_near").increment(to_near);
}

pub fn record_forward_failure(reason: &'static str) {
    counter!("relay_forward_failures_total", "reason" => reason).increment(1);
}

pub fn record_upgrade(outcome: &'static str) {
    counter!("relay_upgrades_total", "outcome" => outcome).increment(1);
}

pub fn record_pipeline_error() {
    counter!("relay_pipeline_errors_total").increment(1);
}
