//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): dispatch latency
//! - `gateway_reconcile_total` (counter): reconciliations by event, outcome
//! - `gateway_reconcile_dropped_total` (counter): keys dropped after max retries
//! - `gateway_queue_depth` (gauge): keys waiting in the work queue
//! - `gateway_routes` (gauge): entries in the routing table

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_reconcile(event: &'static str, outcome: &'static str) {
    counter!("gateway_reconcile_total", "event" => event, "outcome" => outcome).increment(1);
}

pub fn record_reconcile_dropped() {
    counter!("gateway_reconcile_dropped_total").increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("gateway_queue_depth").set(depth as f64);
}

pub fn record_route_count_delta(delta: f64) {
    gauge!("gateway_routes").increment(delta);
}
