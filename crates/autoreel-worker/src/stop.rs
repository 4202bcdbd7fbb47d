//! Cooperative stop signal.

use tokio::sync::watch;

/// Owner side of the stop flag.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Ask the running batch to stop at its next check.
    pub fn request_stop(&self) {
        self.tx.send_replace(true);
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Request a stop; returns `true` when one was already pending, which
    /// the caller treats as a demand to exit now.
    pub fn escalate(&self) -> bool {
        self.tx.send_replace(true)
    }

    pub fn token(&self) -> StopToken {
        StopToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side of the stop flag, held by the batch task.
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested. Never resolves if the handle is gone.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
