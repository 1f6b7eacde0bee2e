//! Ingest metrics.

use metrics::{counter, gauge, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Finished uploads by outcome (committed, failed, rejected, cancelled, timeout).
    pub const UPLOADS_TOTAL: &str = "vtube_uploads_total";

    /// Variants encoded and stored, by quality.
    pub const VARIANTS_ENCODED_TOTAL: &str = "vtube_variants_encoded_total";

    /// Variant encode failures, by quality.
    pub const VARIANT_FAILURES_TOTAL: &str = "vtube_variant_failures_total";

    /// Ladder rungs skipped to avoid upscaling, by quality.
    pub const VARIANTS_SKIPPED_TOTAL: &str = "vtube_variants_skipped_total";

    /// Wall time of a pipeline run.
    pub const INGEST_DURATION_SECONDS: &str = "vtube_ingest_duration_seconds";

    /// Uploads currently running.
    pub const UPLOADS_IN_FLIGHT: &str = "vtube_uploads_in_flight";

    /// Files deleted by the orphan sweep.
    pub const ORPHANS_REMOVED_TOTAL: &str = "vtube_orphans_removed_total";
}

pub fn record_upload(outcome: &'static str, duration_secs: f64) {
    counter!(names::UPLOADS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::INGEST_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn record_variant_encoded(quality: &'static str) {
    counter!(names::VARIANTS_ENCODED_TOTAL, "quality" => quality).increment(1);
}

pub fn record_variant_failure(quality: &'static str) {
    counter!(names::VARIANT_FAILURES_TOTAL, "quality" => quality).increment(1);
}

pub fn record_variant_skipped(quality: &'static str) {
    counter!(names::VARIANTS_SKIPPED_TOTAL, "quality" => quality).increment(1);
}

pub fn uploads_in_flight(delta: f64) {
    gauge!(names::UPLOADS_IN_FLIGHT).increment(delta);
}

pub fn record_orphans_removed(count: usize) {
    counter!(names::ORPHANS_REMOVED_TOTAL).increment(count as u64);
}
