//! Progress-channel messages and batch reports.
//!
//! The orchestrator emits these on its event channel; the presentation
//! layer subscribes and renders them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Iteration, IterationFailure, IterationOutcome, JobId};

/// Terminal outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every iteration ran and none failed
    CompletedClean,
    /// The batch ended on its own but at least one iteration failed
    CompletedWithErrors,
    /// The user asked the batch to stop
    Stopped,
}

impl BatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOutcome::CompletedClean => "completed_clean",
            BatchOutcome::CompletedWithErrors => "completed_with_errors",
            BatchOutcome::Stopped => "stopped",
        }
    }

    /// Resolve the outcome; a stop request wins over errors.
    pub fn resolve(stopped: bool, had_errors: bool) -> Self {
        match (stopped, had_errors) {
            (true, _) => BatchOutcome::Stopped,
            (false, true) => BatchOutcome::CompletedWithErrors,
            (false, false) => BatchOutcome::CompletedClean,
        }
    }
}

/// Event envelope sent to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Human-readable status line, optionally with a 0..1 progress value
    Status {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<f32>,
        timestamp: DateTime<Utc>,
    },

    /// One cooldown second elapsed
    Cooldown { remaining_secs: u32 },

    /// An iteration reached its final outcome
    IterationFinished {
        index: u32,
        outcome: IterationOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        failure: Option<IterationFailure>,
    },

    /// The batch finished; the orchestrator is idle again
    BatchDone {
        #[serde(rename = "jobId")]
        job_id: JobId,
        outcome: BatchOutcome,
        completed: u32,
        failed: u32,
    },

    /// A manual upload finished
    UploadDone { success: bool },
}

impl BatchEvent {
    /// Create a status event.
    pub fn status(message: impl Into<String>, progress: Option<f32>) -> Self {
        Self::Status {
            message: message.into(),
            progress: progress.map(|p| p.clamp(0.0, 1.0)),
            timestamp: Utc::now(),
        }
    }

    pub fn cooldown(remaining_secs: u32) -> Self {
        Self::Cooldown { remaining_secs }
    }

    pub fn iteration_finished(iteration: &Iteration) -> Self {
        Self::IterationFinished {
            index: iteration.index,
            outcome: iteration.outcome,
            failure: iteration.failure.clone(),
        }
    }

    pub fn batch_done(report: &BatchReport) -> Self {
        Self::BatchDone {
            job_id: report.job_id.clone(),
            outcome: report.outcome,
            completed: report.count_success(),
            failed: report.count(IterationOutcome::Failed),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BatchEvent::Status { .. } => "status",
            BatchEvent::Cooldown { .. } => "cooldown",
            BatchEvent::IterationFinished { .. } => "iteration_finished",
            BatchEvent::BatchDone { .. } => "batch_done",
            BatchEvent::UploadDone { .. } => "upload_done",
        }
    }
}

/// Summary of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchReport {
    pub job_id: JobId,
    pub outcome: BatchOutcome,
    /// Every iteration that was started, in order
    pub iterations: Vec<Iteration>,
    /// Number of cooldown sleeps that were entered
    pub cooldowns: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Number of iterations with the given outcome.
    pub fn count(&self, outcome: IterationOutcome) -> u32 {
        self.iterations
            .iter()
            .filter(|i| i.outcome == outcome)
            .count() as u32
    }

    /// Iterations that produced an artifact (rendered or published).
    pub fn count_success(&self) -> u32 {
        self.count(IterationOutcome::Rendered) + self.count(IterationOutcome::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_resolution() {
        assert_eq!(BatchOutcome::resolve(false, false), BatchOutcome::CompletedClean);
        assert_eq!(BatchOutcome::resolve(false, true), BatchOutcome::CompletedWithErrors);
        assert_eq!(BatchOutcome::resolve(true, true), BatchOutcome::Stopped);
    }

    #[test]
    fn test_status_progress_clamped() {
        match BatchEvent::status("x", Some(1.7)) {
            BatchEvent::Status { progress, .. } => assert_eq!(progress, Some(1.0)),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization_tag() {
        let json = serde_json::to_value(BatchEvent::cooldown(12)).unwrap();
        assert_eq!(json["type"], "cooldown");
        assert_eq!(json["remaining_secs"], 12);
    }
}
