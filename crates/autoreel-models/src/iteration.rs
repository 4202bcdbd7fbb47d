//! Per-iteration records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Background asset selection
    AssetSelection,
    /// Text generation
    Generation,
    /// Video composition
    Rendering,
    /// Browser upload
    Publishing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AssetSelection => "asset_selection",
            Stage::Generation => "generation",
            Stage::Rendering => "rendering",
            Stage::Publishing => "publishing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum IterationOutcome {
    #[default]
    Pending,
    Generated,
    Rendered,
    Published,
    Failed,
    Skipped,
}

impl IterationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IterationOutcome::Pending => "pending",
            IterationOutcome::Generated => "generated",
            IterationOutcome::Rendered => "rendered",
            IterationOutcome::Published => "published",
            IterationOutcome::Failed => "failed",
            IterationOutcome::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IterationOutcome::Published | IterationOutcome::Failed | IterationOutcome::Skipped
        )
    }
}

/// Failure recorded against an iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IterationFailure {
    pub stage: Stage,
    pub cause: String,
}

/// One generate -> render -> publish cycle within a job.
///
/// Outcomes only move forward; once terminal the record is frozen.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Iteration {
    /// 0-based index within the job
    pub index: u32,
    /// Chosen background clip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<PathBuf>,
    /// Text as returned by the generator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    /// Wrapped overlay text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    /// Rendered artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub outcome: IterationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<IterationFailure>,
}

impl Iteration {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            background: None,
            raw_text: None,
            display_text: None,
            output_path: None,
            outcome: IterationOutcome::Pending,
            failure: None,
        }
    }

    pub fn set_background(&mut self, path: PathBuf) {
        if !self.outcome.is_terminal() {
            self.background = Some(path);
        }
    }

    pub fn mark_generated(&mut self, raw_text: String, display_text: String) {
        if self.outcome == IterationOutcome::Pending {
            self.raw_text = Some(raw_text);
            self.display_text = Some(display_text);
            self.outcome = IterationOutcome::Generated;
        }
    }

    pub fn mark_rendered(&mut self, output_path: PathBuf) {
        if self.outcome == IterationOutcome::Generated {
            self.output_path = Some(output_path);
            self.outcome = IterationOutcome::Rendered;
        }
    }

    pub fn mark_published(&mut self) {
        if self.outcome == IterationOutcome::Rendered {
            self.outcome = IterationOutcome::Published;
        }
    }

    pub fn mark_failed(&mut self, stage: Stage, cause: impl Into<String>) {
        if !self.outcome.is_terminal() {
            self.failure = Some(IterationFailure {
                stage,
                cause: cause.into(),
            });
            self.outcome = IterationOutcome::Failed;
        }
    }

    pub fn mark_skipped(&mut self) {
        if !self.outcome.is_terminal() {
            self.outcome = IterationOutcome::Skipped;
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == IterationOutcome::Failed
    }
}
