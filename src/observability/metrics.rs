//! Metrics collection and exposition.
//!
//! # Metrics
//! - `disco_requests_total` (counter): requests by method and outcome
//! - `disco_request_duration_seconds` (histogram): accept-to-close latency
//! - `disco_active_connections` (gauge): connections currently owned by a handler
//! - `disco_server_errors_total` (counter): errors reported to the host, by kind
//! - `disco_server_errors_dropped_total` (counter): errors the host's full channel could not take
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it is a no-op
//! - The Prometheus exporter is opt-in and installed by the binary, never by the library

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint at `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request exchange.
///
/// `method` is `"-"` when the request never decoded far enough to have one.
pub fn record_request(method: &'static str, outcome: &'static str, started: Instant) {
    ::metrics::counter!("disco_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("disco_request_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_connection_opened() {
    ::metrics::gauge!("disco_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    ::metrics::gauge!("disco_active_connections").decrement(1.0);
}

pub fn record_server_error(kind: &'static str) {
    ::metrics::counter!("disco_server_errors_total", "kind" => kind).increment(1);
}

pub fn record_dropped_error(kind: &'static str) {
    ::metrics::counter!("disco_server_errors_dropped_total", "kind" => kind).increment(1);
}
