//! Batch job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One requested batch run: N iterations under one prompt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Prompt sent to the text service for every iteration
    #[validate(length(min = 1))]
    pub prompt: String,

    /// Number of iterations requested
    #[validate(range(min = 1))]
    pub count: u32,

    /// Publish each rendered video after it is saved
    pub auto_publish: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job.
    pub fn new(prompt: impl Into<String>, count: u32, auto_publish: bool) -> Self {
        Self {
            id: JobId::new(),
            prompt: prompt.into(),
            count,
            auto_publish,
            created_at: Utc::now(),
        }
    }

    /// Whether `index` is the final iteration of this job.
    pub fn is_last(&self, index: u32) -> bool {
        index + 1 >= self.count
    }
}
