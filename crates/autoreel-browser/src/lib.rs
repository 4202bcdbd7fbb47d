//! Browser automation for publishing rendered videos.
//!
//! - [`driver`]: engine-neutral session primitives and bounded waits
//! - [`webdriver`]: the W3C WebDriver engine (chromedriver)
//! - [`upload`]: the upload state machine and the [`Publisher`] seam

pub mod driver;
pub mod error;
pub mod upload;
pub mod webdriver;

pub use driver::{wait_for, BrowserEngine, BrowserSession, ElementState, Key, WaitCondition};
pub use error::{BrowserError, BrowserResult};
pub use upload::{
    NoopObserver, Publisher, UploadConfig, UploadObserver, UploadOutcome, UploadState, UploadStateMachine,
};
pub use webdriver::{WebDriverConfig, WebDriverEngine, WebDriverSession};
