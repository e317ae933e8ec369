//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define sequencer metrics (cursors, outcomes, responses)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `sequencer_confirmed_sequence` (gauge): latest sequence reported by the ledger
//! - `sequencer_inflight_txs` (gauge): `check_tx_seq - confirmed_sequence`
//! - `sequencer_broadcasts_total` (counter): broadcast attempts by outcome
//! - `sequencer_responses_total` (counter): responses delivered by status
//! - `sequencer_sequence_resets_total` (counter): ResetSequence recoveries
//! - `sequencer_poll_errors_total` (counter): failed account queries
//! - `sequencer_ledger_health` (gauge): 1=reachable, 0=unreachable
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are low-cardinality (outcome, status)

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_confirmed_sequence(sequence: u64) {
    gauge!("sequencer_confirmed_sequence").set(sequence as f64);
}

pub fn record_inflight(count: u64) {
    gauge!("sequencer_inflight_txs").set(count as f64);
}

pub fn record_broadcast_outcome(outcome: &'static str) {
    counter!("sequencer_broadcasts_total", "outcome" => outcome).increment(1);
}

pub fn record_response(status: &'static str) {
    counter!("sequencer_responses_total", "status" => status).increment(1);
}

pub fn record_sequence_reset() {
    counter!("sequencer_sequence_resets_total").increment(1);
}

pub fn record_poll_error() {
    counter!("sequencer_poll_errors_total").increment(1);
}

pub fn record_ledger_health(healthy: bool) {
    gauge!("sequencer_ledger_health").set(if healthy { 1.0 } else { 0.0 });
}
