//! Prometheus metrics for the admission gates.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `trust_service_admissions_total` - Service-plane decisions (labels: outcome, reason)
//! - `trust_user_admissions_total` - User-plane decisions (labels: outcome)
//! - `trust_store_errors_total` - Failed key store calls (labels: op, kind)
//! - `trust_key_syncs_total` - Key sync attempts (labels: status)
//!
//! ## Histograms
//! - `trust_store_call_duration_seconds` - Key store round trip latency (labels: op)
//!
//! Recording functions are no-ops until [`init_metrics`] installs the exporter.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const SERVICE_ADMISSIONS_TOTAL: &str = "trust_service_admissions_total";
    pub const USER_ADMISSIONS_TOTAL: &str = "trust_user_admissions_total";
    pub const STORE_ERRORS_TOTAL: &str = "trust_store_errors_total";
    pub const KEY_SYNCS_TOTAL: &str = "trust_key_syncs_total";
    pub const STORE_CALL_DURATION_SECONDS: &str = "trust_store_call_duration_seconds";
}

/// Install the Prometheus exporter and describe all metrics.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::SERVICE_ADMISSIONS_TOTAL,
        "Service-plane admission decisions"
    );
    describe_counter!(
        names::USER_ADMISSIONS_TOTAL,
        "User-plane admission decisions"
    );
    describe_counter!(
        names::STORE_ERRORS_TOTAL,
        "Key store calls that failed, timed out or were cancelled"
    );
    describe_counter!(names::KEY_SYNCS_TOTAL, "Key sync requests by outcome");
    describe_histogram!(
        names::STORE_CALL_DURATION_SECONDS,
        "Key store round trip duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a service-plane decision.
///
/// `reason` is the admission path (`key`, `bootstrap`) for admitted requests
/// and `missing` or `invalid` for rejected ones.
pub fn record_service_admission(outcome: &'static str, reason: &'static str) {
    counter!(names::SERVICE_ADMISSIONS_TOTAL, "outcome" => outcome, "reason" => reason)
        .increment(1);
}

/// Record a user-plane decision.
pub fn record_user_admission(outcome: &'static str) {
    counter!(names::USER_ADMISSIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_store_error(op: &'static str, kind: &'static str) {
    counter!(names::STORE_ERRORS_TOTAL, "op" => op, "kind" => kind).increment(1);
}

pub fn record_store_duration(op: &'static str, duration_secs: f64) {
    histogram!(names::STORE_CALL_DURATION_SECONDS, "op" => op).record(duration_secs);
}

pub fn record_key_sync(status: &'static str) {
    counter!(names::KEY_SYNCS_TOTAL, "status" => status).increment(1);
}
