//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status and outcome
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_body_rewrites_total` (counter): bodies rewritten, by encoding

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("outcome", outcome.to_string()),
    ];
    metrics::counter!("gateway_requests_total", &labels).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record a rewritten body.
pub fn record_body_rewrite(gzip: bool) {
    let encoding = if gzip { "gzip" } else { "identity" };
    metrics::counter!("gateway_body_rewrites_total", "encoding" => encoding).increment(1);
}
