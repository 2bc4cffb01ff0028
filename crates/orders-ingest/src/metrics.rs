//! Prometheus metrics for stream ingestion.

use metrics::{counter, describe_counter};

/// Metric names for the ingestion consumers.
pub mod names {
    /// Messages fetched from the stream.
    pub const MESSAGES_FETCHED_TOTAL: &str = "orders_ingest_messages_fetched_total";
    /// Messages applied to the write path and committed.
    pub const MESSAGES_APPLIED_TOTAL: &str = "orders_ingest_messages_applied_total";
    /// Malformed messages committed without being applied.
    pub const MESSAGES_SKIPPED_TOTAL: &str = "orders_ingest_messages_skipped_total";
    /// Failed fetch attempts.
    pub const FETCH_FAILURES_TOTAL: &str = "orders_ingest_fetch_failures_total";
    /// Failed apply attempts.
    pub const APPLY_FAILURES_TOTAL: &str = "orders_ingest_apply_failures_total";
    /// Failed commits.
    pub const COMMIT_FAILURES_TOTAL: &str = "orders_ingest_commit_failures_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        names::MESSAGES_FETCHED_TOTAL,
        "Total number of messages fetched from the event stream"
    );
    describe_counter!(
        names::MESSAGES_APPLIED_TOTAL,
        "Total number of messages applied and committed"
    );
    describe_counter!(
        names::MESSAGES_SKIPPED_TOTAL,
        "Total number of malformed messages skipped"
    );
    describe_counter!(
        names::FETCH_FAILURES_TOTAL,
        "Total number of failed fetch attempts"
    );
    describe_counter!(
        names::APPLY_FAILURES_TOTAL,
        "Total number of failed apply attempts"
    );
    describe_counter!(
        names::COMMIT_FAILURES_TOTAL,
        "Total number of failed commits"
    );
}

/// Ingestion metrics recorder.
#[derive(Clone)]
pub struct IngestMetrics;

impl IngestMetrics {
    /// Record a fetched message.
    pub fn fetched(partition: &str) {
        counter!(names::MESSAGES_FETCHED_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    /// Record an applied message.
    pub fn applied(partition: &str) {
        counter!(names::MESSAGES_APPLIED_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    /// Record a skipped message.
    pub fn skipped(partition: &str) {
        counter!(names::MESSAGES_SKIPPED_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    /// Record a failed fetch.
    pub fn fetch_failed(partition: &str) {
        counter!(names::FETCH_FAILURES_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    /// Record a failed apply attempt.
    pub fn apply_failed(partition: &str, error_code: &'static str) {
        counter!(
            names::APPLY_FAILURES_TOTAL,
            "partition" => partition.to_string(),
            "error" => error_code
        )
        .increment(1);
    }

    /// Record a failed commit.
    pub fn commit_failed(partition: &str) {
        counter!(names::COMMIT_FAILURES_TOTAL, "partition" => partition.to_string()).increment(1);
    }
}
