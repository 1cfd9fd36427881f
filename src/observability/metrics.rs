//! Metrics collection and exposition.
//!
//! # Metrics
//! - `arbor_requests_total` (counter): requests by kind and status
//! - `arbor_request_duration_seconds` (histogram): handler latency by kind
//! - `arbor_route_errors_total` (counter): reported errors by kind
//! - `arbor_config_reloads_total` (counter): reload attempts by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("arbor_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    histogram!("arbor_request_duration_seconds", "kind" => kind).record(start.elapsed().as_secs_f64());
}

pub fn record_route_error(kind: &'static str) {
    counter!("arbor_route_errors_total", "kind" => kind).increment(1);
}

pub fn record_config_reload(applied: bool) {
    let outcome = if applied { "applied" } else { "rejected" };
    counter!("arbor_config_reloads_total", "outcome" => outcome).increment(1);
}
