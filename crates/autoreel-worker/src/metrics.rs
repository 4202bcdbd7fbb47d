//! Prometheus metrics for the pipeline.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use autoreel_models::{BatchOutcome, IterationOutcome, Stage};

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const BATCHES_TOTAL: &str = "autoreel_batches_total";
    pub const BATCH_ACTIVE: &str = "autoreel_batch_active";
    pub const ITERATIONS_TOTAL: &str = "autoreel_iterations_total";
    pub const GENERATION_ATTEMPTS_TOTAL: &str = "autoreel_generation_attempts_total";
    pub const GENERATION_DURATION_SECONDS: &str = "autoreel_generation_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "autoreel_stage_duration_seconds";
    pub const UPLOADS_TOTAL: &str = "autoreel_uploads_total";
}

/// Record a finished batch.
pub fn record_batch(outcome: BatchOutcome) {
    counter!(names::BATCHES_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Mark whether a batch or manual upload is running.
pub fn set_batch_active(active: bool) {
    gauge!(names::BATCH_ACTIVE).set(if active { 1.0 } else { 0.0 });
}

/// Record an iteration's final outcome.
pub fn record_iteration(outcome: IterationOutcome) {
    counter!(names::ITERATIONS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Record one model attempt.
pub fn record_generation_attempt(model: &str, success: bool, duration_secs: f64) {
    let labels = [
        ("model", model.to_string()),
        ("result", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!(names::GENERATION_ATTEMPTS_TOTAL, &labels).increment(1);
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record how long a pipeline stage took.
pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.as_str()).record(duration_secs);
}

/// Record an upload attempt.
pub fn record_upload(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!(names::UPLOADS_TOTAL, "result" => result).increment(1);
}
