//! Browser automation errors.

use std::path::PathBuf;
use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("Unexpected WebDriver response: {0}")]
    Protocol(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Session already closed")]
    SessionClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrowserError {
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    pub fn timeout(what: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            secs,
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// WebDriver reports a selector that matches nothing, or an element
    /// that left the DOM between lookup and use.
    pub fn is_missing_element(&self) -> bool {
        matches!(
            self,
            BrowserError::WebDriver { error, .. }
                if error == "no such element" || error == "stale element reference"
        )
    }
}
