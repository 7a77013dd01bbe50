//! Metrics collection and exposition.
//!
//! # Metrics
//! - `unblock_connections_total` (counter): accepted client connections
//! - `unblock_connections_active` (gauge): live client connections
//! - `unblock_exchanges_total` (counter): splice exchanges by outcome
//! - `unblock_exchange_duration_seconds` (histogram): dial to relay latency
//! - `unblock_framing_violations_total` (counter): client framing violations by kind
//!
//! Recording is a no-op until [`init_metrics`] installs an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_opened() {
    counter!("unblock_connections_total").increment(1);
    gauge!("unblock_connections_active").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("unblock_connections_active").decrement(1.0);
}

/// Record the end of one splice exchange.
pub fn record_exchange(outcome: &'static str, started: Instant) {
    counter!("unblock_exchanges_total", "outcome" => outcome).increment(1);
    histogram!("unblock_exchange_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_framing_violation(kind: &'static str) {
    counter!("unblock_framing_violations_total", "kind" => kind).increment(1);
}
