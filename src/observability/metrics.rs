//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (requests, latency, unmatched paths, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `routekit_requests_total` (counter): requests by method, status, route
//! - `routekit_request_duration_seconds` (histogram): dispatch latency
//! - `routekit_unmatched_total` (counter): requests no route answered
//! - `routekit_reloads_total` (counter): dispatcher reloads by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates; a no-op until a recorder is installed
//! - Route label is the template, never the raw path

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    metrics::counter!("routekit_requests_total", &labels).increment(1);
    metrics::histogram!("routekit_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_unmatched(method: &str) {
    metrics::counter!("routekit_unmatched_total", "method" => method.to_string()).increment(1);
}

pub fn record_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("routekit_reloads_total", "outcome" => outcome).increment(1);
}
