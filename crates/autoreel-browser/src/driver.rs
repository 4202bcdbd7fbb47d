//! Engine-neutral browser primitives.
//!
//! The upload protocol only needs a handful of operations: launch a
//! persistent context, navigate, look at elements by CSS selector, and
//! simulate keyboard input. Engines implement [`BrowserEngine`] and
//! [`BrowserSession`]; everything above this module is written against
//! these traits.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{BrowserError, BrowserResult};

/// Snapshot of one element's interactability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementState {
    /// Present in the DOM
    pub attached: bool,
    /// Rendered and not hidden
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
}

impl ElementState {
    pub const DETACHED: ElementState = ElementState {
        attached: false,
        visible: false,
        enabled: false,
    };
}

/// What [`wait_for`] waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    Attached,
    Visible,
}

impl WaitCondition {
    pub fn is_met(&self, state: &ElementState) -> bool {
        match self {
            WaitCondition::Attached => state.attached,
            WaitCondition::Visible => state.attached && state.visible,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaitCondition::Attached => "attached",
            WaitCondition::Visible => "visible",
        }
    }
}

/// Keys used in chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Control,
    Backspace,
    Enter,
    Char(char),
}

/// Launches browser contexts.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a context whose cookies and storage persist in `profile_dir`.
    async fn launch_persistent(&self, profile_dir: &Path) -> BrowserResult<Box<dyn BrowserSession>>;
}

/// One open browser context with a single page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the DOM to load.
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;

    async fn current_url(&mut self) -> BrowserResult<String>;

    /// State of the first element matching `selector`.
    ///
    /// A selector that matches nothing is reported as
    /// [`ElementState::DETACHED`], not as an error.
    async fn element_state(&mut self, selector: &str) -> BrowserResult<ElementState>;

    async fn inner_text(&mut self, selector: &str) -> BrowserResult<String>;

    /// Hand a local file to a file input.
    async fn set_input_files(&mut self, selector: &str, file: &Path) -> BrowserResult<()>;

    async fn click(&mut self, selector: &str) -> BrowserResult<()>;

    /// Press the keys together and release them in reverse order.
    async fn press(&mut self, chord: &[Key]) -> BrowserResult<()>;

    /// Type text into the focused element.
    async fn type_text(&mut self, text: &str) -> BrowserResult<()>;

    /// Close the context. Called once per session.
    async fn close(&mut self) -> BrowserResult<()>;
}

/// Poll `selector` until `condition` holds or `timeout` elapses.
///
/// Errors from a single poll are treated as a miss and polling continues.
pub async fn wait_for(
    session: &mut dyn BrowserSession,
    selector: &str,
    condition: WaitCondition,
    timeout: Duration,
    poll_interval: Duration,
) -> BrowserResult<ElementState> {
    let deadline = Instant::now() + timeout;

    loop {
        match session.element_state(selector).await {
            Ok(state) if condition.is_met(&state) => return Ok(state),
            Ok(_) => {}
            Err(e) => debug!("Poll for {} failed: {}", selector, e),
        }

        if Instant::now() >= deadline {
            return Err(BrowserError::timeout(
                format!("{} to be {}", selector, condition.as_str()),
                timeout.as_secs(),
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Session whose element becomes visible after a number of polls.
    struct Appearing {
        polls: usize,
        visible_after: usize,
    }

    #[async_trait]
    impl BrowserSession for Appearing {
        async fn goto(&mut self, _url: &str) -> BrowserResult<()> {
            Ok(())
        }
        async fn current_url(&mut self) -> BrowserResult<String> {
            Ok(String::new())
        }
        async fn element_state(&mut self, _selector: &str) -> BrowserResult<ElementState> {
            self.polls += 1;
            if self.polls == 1 {
                return Err(BrowserError::protocol("transient"));
            }
            let ready = self.polls > self.visible_after;
            Ok(ElementState {
                attached: true,
                visible: ready,
                enabled: ready,
            })
        }
        async fn inner_text(&mut self, _selector: &str) -> BrowserResult<String> {
            Ok(String::new())
        }
        async fn set_input_files(&mut self, _selector: &str, _file: &Path) -> BrowserResult<()> {
            Ok(())
        }
        async fn click(&mut self, _selector: &str) -> BrowserResult<()> {
            Ok(())
        }
        async fn press(&mut self, _chord: &[Key]) -> BrowserResult<()> {
            Ok(())
        }
        async fn type_text(&mut self, _text: &str) -> BrowserResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> BrowserResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_absorbs_transient_errors() {
        let mut session = Appearing {
            polls: 0,
            visible_after: 3,
        };
        let state = wait_for(
            &mut session,
            "#x",
            WaitCondition::Visible,
            Duration::from_secs(10),
            Duration::from_millis(500),
        )
        .await
        .unwrap();
        assert!(state.visible);
        assert_eq!(session.polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let mut session = Appearing {
            polls: 0,
            visible_after: usize::MAX,
        };
        let started = Instant::now();
        let err = wait_for(
            &mut session,
            "#x",
            WaitCondition::Visible,
            Duration::from_secs(5),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BrowserError::Timeout { secs: 5, .. }));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(7));
    }

    #[test]
    fn test_conditions() {
        let hidden = ElementState {
            attached: true,
            visible: false,
            enabled: true,
        };
        assert!(WaitCondition::Attached.is_met(&hidden));
        assert!(!WaitCondition::Visible.is_met(&hidden));
        assert!(!WaitCondition::Attached.is_met(&ElementState::DETACHED));
    }
}
