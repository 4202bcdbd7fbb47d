//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::generator::GenerationFailure;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("No background video found in {0}")]
    NoAssets(PathBuf),

    #[error("Content generation failed: {0}")]
    Generation(#[from] GenerationFailure),

    #[error("Media error: {0}")]
    Media(#[from] autoreel_media::MediaError),

    #[error("Browser error: {0}")]
    Browser(#[from] autoreel_browser::BrowserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }
}
