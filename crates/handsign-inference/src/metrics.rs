//! Prediction metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const PREDICTIONS_TOTAL: &str = "handsign_predictions_total";
    pub const PREDICTION_DURATION_SECONDS: &str = "handsign_prediction_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "handsign_stage_failures_total";
}

/// Record a finished prediction by outcome.
pub fn record_prediction(outcome: &'static str, duration_secs: f64) {
    let labels = [("outcome", outcome)];
    counter!(names::PREDICTIONS_TOTAL, &labels).increment(1);
    histogram!(names::PREDICTION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a pipeline stage that ended a request with an error.
pub fn record_stage_failure(stage: &'static str) {
    let labels = [("stage", stage)];
    counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
}
