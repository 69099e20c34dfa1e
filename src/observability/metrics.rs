//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_builds_total` (counter): target builds by target, result
//! - `dev_build_duration_seconds` (histogram): build time by target
//! - `dev_render_requests_total` (counter): catch-all renders by result
//! - `dev_middleware_failures_total` (counter): failed interceptors by name
//! - `dev_hot_clients` (gauge): connected hot-update event streams
//!
//! # Design Decisions
//! - Recording is always on; without an installed exporter it costs nothing
//! - The Prometheus exporter runs its own listener, separate from the app

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_build(target: &str, ok: bool, duration: Duration) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("dev_builds_total", "target" => target.to_string(), "result" => result).increment(1);
    metrics::histogram!("dev_build_duration_seconds", "target" => target.to_string())
        .record(duration.as_secs_f64());
}

/// `result` is one of `ok`, `unavailable`, `building`, `failed`.
pub fn record_render(result: &'static str) {
    metrics::counter!("dev_render_requests_total", "result" => result).increment(1);
}

pub fn record_middleware_failure(middleware: &'static str) {
    metrics::counter!("dev_middleware_failures_total", "middleware" => middleware).increment(1);
}

pub fn record_hot_clients(count: usize) {
    metrics::gauge!("dev_hot_clients").set(count as f64);
}
