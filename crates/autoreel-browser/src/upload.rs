//! Browser-driven upload protocol.
//!
//! One [`UploadStateMachine::publish`] call opens a persistent browser
//! context, walks the upload page through a fixed sequence of states and
//! closes the context again. The context is closed exactly once on every
//! path, including faults and panics inside the protocol.

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::driver::{wait_for, BrowserEngine, BrowserSession, Key, WaitCondition};
use crate::error::{BrowserError, BrowserResult};

/// Protocol timings, target page and selectors.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_url: String,
    /// URL path of the upload page; any other page means "not logged in"
    pub upload_path: String,
    /// Substring that marks a login redirect
    pub login_marker: String,
    pub file_input_selector: String,
    pub caption_selector: String,
    pub publish_selector: String,
    /// Publish button label while the file is still uploading
    pub busy_label: String,
    pub navigation_timeout: Duration,
    pub login_timeout: Duration,
    pub login_poll_interval: Duration,
    pub attach_timeout: Duration,
    pub caption_timeout: Duration,
    pub processing_timeout: Duration,
    pub processing_poll_interval: Duration,
    pub element_poll_interval: Duration,
    /// Grace period after clicking publish before the context closes
    pub settle_duration: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_url: "https://www.tiktok.com/tiktokstudio/upload".to_string(),
            upload_path: "/tiktokstudio/upload".to_string(),
            login_marker: "login".to_string(),
            file_input_selector: r#"input[type="file"]"#.to_string(),
            caption_selector: ".notranslate.public-DraftEditor-content".to_string(),
            publish_selector: r#"button[data-e2e="post_video_button"]"#.to_string(),
            busy_label: "Uploading".to_string(),
            navigation_timeout: Duration::from_secs(120),
            login_timeout: Duration::from_secs(600),
            login_poll_interval: Duration::from_secs(1),
            attach_timeout: Duration::from_secs(60),
            caption_timeout: Duration::from_secs(60),
            processing_timeout: Duration::from_secs(300),
            processing_poll_interval: Duration::from_secs(3),
            element_poll_interval: Duration::from_millis(500),
            settle_duration: Duration::from_secs(15),
        }
    }
}

/// States of the upload protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    Start,
    Navigate,
    AuthCheck,
    AwaitLogin,
    AttachFile,
    FillCaption,
    AwaitProcessing,
    Publish,
    Settle,
    Closed,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Start => "start",
            UploadState::Navigate => "navigate",
            UploadState::AuthCheck => "auth_check",
            UploadState::AwaitLogin => "await_login",
            UploadState::AttachFile => "attach_file",
            UploadState::FillCaption => "fill_caption",
            UploadState::AwaitProcessing => "await_processing",
            UploadState::Publish => "publish",
            UploadState::Settle => "settle",
            UploadState::Closed => "closed",
            UploadState::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one publish attempt.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub success: bool,
    /// `Closed` on success, otherwise the state the protocol failed in
    pub last_state: UploadState,
    /// One-line diagnostic on failure
    pub error: Option<String>,
}

impl UploadOutcome {
    fn succeeded() -> Self {
        Self {
            success: true,
            last_state: UploadState::Closed,
            error: None,
        }
    }

    fn failed(state: UploadState, error: impl Into<String>) -> Self {
        Self {
            success: false,
            last_state: state,
            error: Some(error.into()),
        }
    }
}

/// Receives every state transition of an upload.
pub trait UploadObserver: Send + Sync {
    fn on_state(&self, state: UploadState);
}

/// Observer that ignores transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {
    fn on_state(&self, _state: UploadState) {}
}

/// Publishes a rendered video. Never fails across this boundary.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn upload(&self, video: &Path, description: &str, observer: &dyn UploadObserver) -> bool;
}

/// Drives a [`BrowserEngine`] through the upload protocol.
pub struct UploadStateMachine {
    engine: Arc<dyn BrowserEngine>,
    profile_dir: PathBuf,
    config: UploadConfig,
}

impl UploadStateMachine {
    pub fn new(engine: Arc<dyn BrowserEngine>, profile_dir: impl Into<PathBuf>, config: UploadConfig) -> Self {
        Self {
            engine,
            profile_dir: profile_dir.into(),
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Publish `video` with `description`; `true` once the publish control
    /// was clicked and the settle period elapsed.
    pub async fn publish(&self, video: &Path, description: &str) -> bool {
        self.publish_detailed(video, description, &NoopObserver)
            .await
            .success
    }

    /// Publish and report where the protocol stopped.
    pub async fn publish_detailed(
        &self,
        video: &Path,
        description: &str,
        observer: &dyn UploadObserver,
    ) -> UploadOutcome {
        if !video.is_file() {
            let err = BrowserError::FileNotFound(video.to_path_buf());
            warn!("Upload skipped: {}", err);
            observer.on_state(UploadState::Failed);
            return UploadOutcome::failed(UploadState::Start, err.to_string());
        }

        observer.on_state(UploadState::Start);
        let mut session = match self.engine.launch_persistent(&self.profile_dir).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to open browser context: {}", e);
                observer.on_state(UploadState::Failed);
                return UploadOutcome::failed(UploadState::Start, e.to_string());
            }
        };

        let mut tracker = StateTracker {
            current: UploadState::Start,
            observer,
        };
        let result = AssertUnwindSafe(self.run_protocol(session.as_mut(), video, description, &mut tracker))
            .catch_unwind()
            .await;
        let reached = tracker.current;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser context: {}", e);
        }

        let outcome = match result {
            Ok(Ok(())) => UploadOutcome::succeeded(),
            Ok(Err(e)) => {
                error!("Upload failed in state {}: {}", reached, e);
                UploadOutcome::failed(reached, e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Upload panicked in state {}: {}", reached, message);
                UploadOutcome::failed(reached, format!("internal fault: {}", message))
            }
        };

        observer.on_state(if outcome.success {
            UploadState::Closed
        } else {
            UploadState::Failed
        });
        outcome
    }

    async fn run_protocol(
        &self,
        session: &mut dyn BrowserSession,
        video: &Path,
        description: &str,
        tracker: &mut StateTracker<'_>,
    ) -> BrowserResult<()> {
        let cfg = &self.config;

        tracker.enter(UploadState::Navigate);
        tokio::time::timeout(cfg.navigation_timeout, session.goto(&cfg.upload_url))
            .await
            .map_err(|_| BrowserError::timeout("upload page", cfg.navigation_timeout.as_secs()))??;

        tracker.enter(UploadState::AuthCheck);
        let url = session.current_url().await?;
        if !self.is_authenticated_url(&url) {
            tracker.enter(UploadState::AwaitLogin);
            info!("Not logged in (at {}), waiting for login", url);
            self.await_login(session).await?;
        }

        tracker.enter(UploadState::AttachFile);
        wait_for(
            session,
            &cfg.file_input_selector,
            WaitCondition::Attached,
            cfg.attach_timeout,
            cfg.element_poll_interval,
        )
        .await?;
        session.set_input_files(&cfg.file_input_selector, video).await?;

        tracker.enter(UploadState::FillCaption);
        wait_for(
            session,
            &cfg.caption_selector,
            WaitCondition::Visible,
            cfg.caption_timeout,
            cfg.element_poll_interval,
        )
        .await?;
        session.click(&cfg.caption_selector).await?;
        session.press(&[Key::Control, Key::Char('a')]).await?;
        session.press(&[Key::Backspace]).await?;
        session.type_text(description).await?;

        tracker.enter(UploadState::AwaitProcessing);
        self.await_processing(session).await?;

        tracker.enter(UploadState::Publish);
        session.click(&cfg.publish_selector).await?;

        tracker.enter(UploadState::Settle);
        tokio::time::sleep(cfg.settle_duration).await;
        Ok(())
    }

    /// Whether `url` is the upload page rather than a login redirect.
    fn is_authenticated_url(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(parsed) => {
                let path = parsed.path().trim_end_matches('/');
                path.ends_with(self.config.upload_path.trim_end_matches('/'))
                    && !path.contains(&self.config.login_marker)
            }
            Err(_) => false,
        }
    }

    async fn await_login(&self, session: &mut dyn BrowserSession) -> BrowserResult<()> {
        let cfg = &self.config;
        let deadline = Instant::now() + cfg.login_timeout;

        loop {
            tokio::time::sleep(cfg.login_poll_interval).await;
            match session.current_url().await {
                Ok(url) if self.is_authenticated_url(&url) => {
                    info!("Login detected");
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!("URL poll failed: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout("login", cfg.login_timeout.as_secs()));
            }
        }
    }

    async fn await_processing(&self, session: &mut dyn BrowserSession) -> BrowserResult<()> {
        let cfg = &self.config;
        let deadline = Instant::now() + cfg.processing_timeout;

        loop {
            match self.publish_ready(session).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => debug!("Publish control poll failed: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout(
                    "video processing",
                    cfg.processing_timeout.as_secs(),
                ));
            }
            tokio::time::sleep(cfg.processing_poll_interval).await;
        }
    }

    async fn publish_ready(&self, session: &mut dyn BrowserSession) -> BrowserResult<bool> {
        let state = session.element_state(&self.config.publish_selector).await?;
        if !(state.visible && state.enabled) {
            return Ok(false);
        }
        let label = session.inner_text(&self.config.publish_selector).await?;
        Ok(!label.contains(&self.config.busy_label))
    }
}

#[async_trait]
impl Publisher for UploadStateMachine {
    async fn upload(&self, video: &Path, description: &str, observer: &dyn UploadObserver) -> bool {
        self.publish_detailed(video, description, observer)
            .await
            .success
    }
}

struct StateTracker<'a> {
    current: UploadState,
    observer: &'a dyn UploadObserver,
}

impl StateTracker<'_> {
    fn enter(&mut self, state: UploadState) {
        debug!("Upload state {} -> {}", self.current, state);
        self.current = state;
        self.observer.on_state(state);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
