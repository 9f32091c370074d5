//! Metrics collection and exposition.
//!
//! # Metrics
//! - `policy_lookups_total` (counter): lookups by phase and outcome
//! - `policy_reloads_total` (counter): reloads by result
//! - `policy_entries` (gauge): entries per loaded policy file
//! - `policy_generation` (gauge): generation of the published policy set
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exposition is opt-in via configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_lookup(phase: &'static str, outcome: &'static str) {
    metrics::counter!("policy_lookups_total", "phase" => phase, "outcome" => outcome).increment(1);
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("policy_reloads_total", "result" => result).increment(1);
}

pub fn record_entries(file: &str, entries: usize) {
    metrics::gauge!("policy_entries", "file" => file.to_string()).set(entries as f64);
}

pub fn record_generation(generation: u64) {
    metrics::gauge!("policy_generation").set(generation as f64);
}
