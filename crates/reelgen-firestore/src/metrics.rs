//! Firestore request metrics.

use std::time::Duration;

use metrics::{counter, histogram};

/// Metric name constants.
pub mod names {
    /// Requests by operation and HTTP status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";
}

/// Record a completed request (including all of its retries).
pub fn record_request(operation: &str, status: u16, latency: Duration) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation.to_string())
        .record(latency.as_secs_f64());
}

/// Record one retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("get_document", 200, Duration::from_millis(12));
        record_retry("get_document");
        assert!(names::REQUESTS_TOTAL.starts_with("firestore_"));
    }
}
