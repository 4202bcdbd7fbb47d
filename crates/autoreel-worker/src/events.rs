//! Event channel from the orchestrator to the presentation layer.

use tokio::sync::mpsc;

use autoreel_models::BatchEvent;

/// Create a connected sender/receiver pair.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx: Some(tx) }, EventReceiver { rx })
}

/// Event sender handed to the orchestrator.
///
/// Unbounded so a slow consumer never stalls the batch and the final
/// `BatchDone` is never dropped. Sending after the receiver is gone is a
/// no-op.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl EventSender {
    /// Sender with no subscriber.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Send an event (non-blocking).
    pub fn send(&self, event: BatchEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Send a status line.
    pub fn status(&self, message: impl Into<String>, progress: Option<f32>) {
        self.send(BatchEvent::status(message, progress));
    }
}

/// Receiving half of [`event_channel`].
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<BatchEvent>,
}

impl EventReceiver {
    /// Receive the next event; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<BatchEvent> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<BatchEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<BatchEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
