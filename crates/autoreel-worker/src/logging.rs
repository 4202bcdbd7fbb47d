//! Structured batch logging utilities.
//!
//! Provides consistent, structured logging for batch processing with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use autoreel_models::JobId;

/// Initialize tracing: JSON output when `LOG_FORMAT=json`, colored text
/// otherwise. `RUST_LOG` directives are added to `autoreel=info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "autoreel=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    // try_init: a second call (tests, embedding) keeps the first subscriber.
    if use_json {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init();
    }
}

/// Batch logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct BatchLogger {
    job_id: String,
    operation: String,
}

impl BatchLogger {
    /// Create a logger for a job and operation (`batch`, `manual_upload`).
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Batch started: {}", message
        );
    }

    pub fn log_progress(&self, iteration: u32, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            iteration,
            "Batch progress: {}", message
        );
    }

    pub fn log_warning(&self, iteration: u32, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            iteration,
            "Batch warning: {}", message
        );
    }

    pub fn log_error(&self, iteration: u32, stage: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            iteration,
            stage,
            "Batch error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Batch completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job id and operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "batch",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
