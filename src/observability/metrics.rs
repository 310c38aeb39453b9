//! Metrics collection and exposition.
//!
//! # Metrics
//! - `nav_requests_total` (counter): requests by endpoint, status
//! - `nav_request_duration_seconds` (histogram): latency distribution
//! - `nav_rate_limited_total` (counter): denials by gate
//! - `nav_rate_gate_entries` (gauge): tracked client windows by gate
//! - `nav_address_cache_total` (counter): lookups by result (hit, miss)
//! - `nav_upstream_requests_total` (counter): upstream calls by service, outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    metrics::counter!(
        "nav_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("nav_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(gate: &'static str) {
    metrics::counter!("nav_rate_limited_total", "gate" => gate).increment(1);
}

pub fn record_gate_entries(gate: &'static str, entries: usize) {
    metrics::gauge!("nav_rate_gate_entries", "gate" => gate).set(entries as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("nav_address_cache_total", "result" => result).increment(1);
}

pub fn record_upstream(service: &'static str, outcome: &'static str) {
    metrics::counter!(
        "nav_upstream_requests_total",
        "service" => service,
        "outcome" => outcome
    )
    .increment(1);
}
