//! Pipeline metrics.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Metric names as constants for consistency.
pub mod names {
    pub const DURATION_VIOLATIONS_TOTAL: &str = "reelgen_duration_violations_total";
    pub const REPAIR_ATTEMPTS_TOTAL: &str = "reelgen_repair_attempts_total";
    pub const REPAIR_UNRESOLVED_TOTAL: &str = "reelgen_repair_unresolved_total";
    pub const WATERMARK_DECISIONS_TOTAL: &str = "reelgen_watermark_decisions_total";
    pub const PIPELINE_RUNS_TOTAL: &str = "reelgen_pipeline_runs_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "reelgen_pipeline_duration_seconds";
}

/// Install a Prometheus recorder serving `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

pub fn record_duration_violations(count: usize) {
    if count > 0 {
        counter!(names::DURATION_VIOLATIONS_TOTAL).increment(count as u64);
    }
}

pub fn record_repair_attempt(outcome: &str) {
    counter!(names::REPAIR_ATTEMPTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_repair_unresolved(count: usize) {
    if count > 0 {
        counter!(names::REPAIR_UNRESOLVED_TOTAL).increment(count as u64);
    }
}

pub fn record_watermark_decision(required: bool, reason: &str) {
    let labels = [
        ("decision", if required { "watermark" } else { "clean" }.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::WATERMARK_DECISIONS_TOTAL, &labels).increment(1);
}

pub fn record_pipeline_run(outcome: &str, duration_secs: f64) {
    counter!(names::PIPELINE_RUNS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS, "outcome" => outcome.to_string())
        .record(duration_secs);
}
