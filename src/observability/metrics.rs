//! Metrics collection and exposition.
//!
//! # Metrics
//! - `engine_components_registered` (gauge): registered component count
//! - `engine_component_failures_total` (counter): failures by phase
//! - `engine_phase_duration_seconds` (histogram): configure/start/shutdown pass time
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Prometheus exposition is opt-in from the binary

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::Phase;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_gauge!(
        "engine_components_registered",
        "Number of components registered with the engine"
    );
    ::metrics::describe_counter!(
        "engine_component_failures_total",
        "Component lifecycle failures by phase"
    );
    ::metrics::describe_histogram!(
        "engine_phase_duration_seconds",
        "Duration of each engine lifecycle pass"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn set_registered(count: usize) {
    ::metrics::gauge!("engine_components_registered").set(count as f64);
}

pub fn record_failure(phase: Phase) {
    ::metrics::counter!("engine_component_failures_total", "phase" => phase.as_str()).increment(1);
}

pub fn record_phase_duration(phase: Phase, elapsed: Duration) {
    ::metrics::histogram!("engine_phase_duration_seconds", "phase" => phase.as_str())
        .record(elapsed.as_secs_f64());
}
