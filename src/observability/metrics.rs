//! Metrics collection and exposition.
//!
//! # Metrics
//! - `keepalive_connections_active` (gauge): live sessions
//! - `keepalive_sessions_total` (counter): finished sessions by `state`
//! - `keepalive_exchanges_total` (counter): responses written by `status`
//! - `keepalive_exchange_duration_seconds` (histogram): handler + write time
//! - `keepalive_read_timeouts_total` (counter): sessions ended by a read timeout
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn connection_opened() {
    gauge!("keepalive_connections_active").increment(1.0);
}

pub fn connection_closed() {
    gauge!("keepalive_connections_active").decrement(1.0);
}

pub fn record_session_end(state: &'static str) {
    counter!("keepalive_sessions_total", "state" => state).increment(1);
}

pub fn record_exchange(status: u16, start: Instant) {
    counter!("keepalive_exchanges_total", "status" => status.to_string()).increment(1);
    histogram!("keepalive_exchange_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_read_timeout() {
    counter!("keepalive_read_timeouts_total").increment(1);
}
