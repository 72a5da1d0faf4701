//! Prometheus metrics for observability and monitoring.
//!
//! This module describes every metric the controller records and groups the
//! recording calls by concern:
//! - Inbound event processing
//! - Watchdog expectations
//! - Customer sessions
//! - Topology and viewers
//! - Bus publish/reconnect
//!
//! # Example
//!
//! ```rust,no_run
//! use concourse_runtime::metrics::{install, EngineMetrics};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = install()?;
//! EngineMetrics::record_event("connection");
//! println!("{}", handle.render());
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and describe all metrics.
///
/// The returned handle renders the exposition text served at `/metrics`.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a global recorder is already installed.
pub fn install() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "concourse_events_processed_total",
        "Inbound bus events processed, labelled by kind"
    );
    describe_counter!(
        "concourse_events_malformed_total",
        "Inbound bus messages or payloads that could not be decoded"
    );

    describe_counter!(
        "concourse_expectations_armed_total",
        "Watchdog expectations armed"
    );
    describe_counter!(
        "concourse_expectations_resolved_total",
        "Watchdog expectations cancelled by a correlated response"
    );
    describe_counter!(
        "concourse_expectations_expired_total",
        "Watchdog expectations that timed out and evicted a participant"
    );

    describe_counter!(
        "concourse_customers_satisfied_total",
        "Customers leaving a queue, labelled by how they were satisfied"
    );

    describe_gauge!(
        "concourse_participants",
        "Registered participants, labelled by role"
    );
    describe_gauge!(
        "concourse_viewers_connected",
        "Dashboard viewers currently connected"
    );

    describe_counter!(
        "concourse_bus_published_total",
        "Messages published to the bus"
    );
    describe_counter!(
        "concourse_bus_publish_errors_total",
        "Publish attempts that failed"
    );
    describe_counter!(
        "concourse_bus_retries_total",
        "Bus subscription retry attempts"
    );
}

/// Inbound event metrics recorder.
pub struct EngineMetrics;

impl EngineMetrics {
    /// Record one processed event.
    pub fn record_event(kind: &'static str) {
        counter!("concourse_events_processed_total", "kind" => kind).increment(1);
    }

    /// Record an undecodable message or payload.
    pub fn record_malformed() {
        counter!("concourse_events_malformed_total").increment(1);
    }
}

/// Watchdog metrics recorder.
pub struct WatchdogMetrics;

impl WatchdogMetrics {
    /// Record an armed expectation.
    pub fn record_armed() {
        counter!("concourse_expectations_armed_total").increment(1);
    }

    /// Record an expectation cancelled by its response.
    pub fn record_resolved() {
        counter!("concourse_expectations_resolved_total").increment(1);
    }

    /// Record an expired expectation.
    pub fn record_expired() {
        counter!("concourse_expectations_expired_total").increment(1);
    }
}

/// Customer session metrics recorder.
pub struct CustomerMetrics;

impl CustomerMetrics {
    /// Record a customer reaching the terminal state.
    pub fn record_satisfied(kind: &'static str) {
        counter!("concourse_customers_satisfied_total", "kind" => kind).increment(1);
    }
}

/// Topology metrics recorder.
pub struct TopologyMetrics;

impl TopologyMetrics {
    /// Record the current participant count for a role.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_participants(role: &'static str, count: usize) {
        gauge!("concourse_participants", "role" => role).set(count as f64);
    }

    /// Record the current number of dashboard viewers.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_viewers(count: usize) {
        gauge!("concourse_viewers_connected").set(count as f64);
    }
}

/// Bus metrics recorder.
pub struct BusMetrics;

impl BusMetrics {
    /// Record a published message.
    pub fn record_publish() {
        counter!("concourse_bus_published_total").increment(1);
    }

    /// Record a failed publish.
    pub fn record_publish_error() {
        counter!("concourse_bus_publish_errors_total").increment(1);
    }

    /// Record a retry attempt.
    pub fn record_retry() {
        counter!("concourse_bus_retries_total").increment(1);
    }
}
