//! Metrics collection and exposition.
//!
//! # Metrics
//! - `items_requests_total` (counter): requests by operation, status, outcome
//! - `items_request_duration_seconds` (histogram): latency per operation
//! - `items_store_size` (gauge): resources currently stored
//! - `items_unrecovered_faults_total` (counter): panics caught per operation
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus endpoint served on its own address

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

pub fn record_request(operation: &'static str, status: u16, outcome: &'static str, started: Instant) {
    counter!(
        "items_requests_total",
        "operation" => operation,
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("items_request_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_store_size(len: usize) {
    gauge!("items_store_size").set(len as f64);
}

pub fn record_unrecovered_fault(operation: &'static str) {
    counter!("items_unrecovered_faults_total", "operation" => operation).increment(1);
}
