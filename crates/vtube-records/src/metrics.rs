//! Record store metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Store operations by operation and outcome.
    pub const OPERATIONS_TOTAL: &str = "vtube_record_operations_total";

    /// Committed video records.
    pub const RECORDS_SAVED_TOTAL: &str = "vtube_records_saved_total";

    /// Operation latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vtube_record_latency_seconds";
}

/// Record metrics for a completed store operation.
pub fn record_operation(operation: &'static str, success: bool, latency_secs: f64) {
    counter!(
        names::OPERATIONS_TOTAL,
        "operation" => operation,
        "outcome" => if success { "success" } else { "error" }
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation).record(latency_secs);
}

pub fn record_saved() {
    counter!(names::RECORDS_SAVED_TOTAL).increment(1);
}
