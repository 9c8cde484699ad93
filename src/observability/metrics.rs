//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lab_attempts_total` (counter): attempts by outcome
//! - `lab_calls_total` (counter): calls by final result
//! - `lab_breaker_transitions_total` (counter): transitions by from/to
//! - `lab_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `lab_attempt_latency_seconds` (histogram): per-attempt latency
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels are static strings

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::CallError;
use crate::observability::event_log::AttemptOutcome;
use crate::resilience::circuit_breaker::BreakerState;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(outcome: AttemptOutcome, latency: Duration) {
    ::metrics::counter!("lab_attempts_total", "outcome" => outcome.as_str()).increment(1);
    if outcome != AttemptOutcome::ShortCircuited {
        ::metrics::histogram!("lab_attempt_latency_seconds").record(latency.as_secs_f64());
    }
}

pub fn record_transition(from: BreakerState, to: BreakerState) {
    ::metrics::counter!(
        "lab_breaker_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    ::metrics::gauge!("lab_breaker_state").set(to.as_gauge());
}

pub fn record_call(result: Result<(), &CallError>) {
    let label = match result {
        Ok(()) => "ok",
        Err(e) => e.kind().as_str(),
    };
    ::metrics::counter!("lab_calls_total", "result" => label).increment(1);
}
