//! Progress channel from the batch worker to the presentation layer.

use tokio::sync::mpsc;

/// Default capacity of the progress channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// Events emitted by the worker, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A run began; the trigger should be disabled.
    Started,
    /// One line for the log view.
    Log(String),
    /// The run ended; the trigger can be enabled again.
    Finished,
}

/// Append-only log channel.
///
/// The sink only enqueues. The presentation layer owns the receiver and applies events on its
/// own loop, so the worker never touches presentation state.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSink {
    /// Creates a sink and the receiver the presentation loop should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Appends a log line.
    pub async fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "nanobatch::progress", "{message}");
        self.emit(ProgressEvent::Log(message)).await;
    }

    pub(crate) async fn emit(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is watching.
        if self.tx.send(event).await.is_err() {
            tracing::debug!("progress receiver closed; event dropped");
        }
    }
}
