//! Streaming relay: step events, fragment forwarding, guaranteed completion.
//!
//! The relay converts the model's lazy fragment sequence into an ordered
//! event delivery: each fragment becomes one `Content` event the moment it
//! arrives, wrapped by a step-status protocol (`refine`/`generate`
//! start/complete). The `generate complete` event is emitted by a drop guard
//! so no error or early return can skip it; a client waiting on it is never
//! left hanging.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One incremental piece of model-generated text, delivered before the full
/// reply is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
}

/// Pipeline stage named in step events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Refine,
    Generate,
}

/// Step status: a stage has started or finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Start,
    Complete,
}

/// Event delivered to the sink, in strict chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepEvent {
    /// Stage progress notification, distinct from content.
    Step {
        stage: Stage,
        status: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// One text fragment of model output.
    Content { text: String },
    /// A mid-stream failure; followed by exactly one `generate complete` step.
    Error { message: String },
}

impl StepEvent {
    /// A step event without a result payload.
    pub fn step(stage: Stage, status: StepStatus) -> Self {
        Self::Step {
            stage,
            status,
            result: None,
        }
    }

    /// A step event carrying a result (e.g. the refined topic).
    pub fn step_with_result(stage: Stage, status: StepStatus, result: impl Into<String>) -> Self {
        Self::Step {
            stage,
            status,
            result: Some(result.into()),
        }
    }

    /// A content event for one fragment.
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    /// An error event carrying the failure message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Sending half of the event sink. Cloneable; sends never block.
///
/// When the receiving side is gone (console closed, HTTP client
/// disconnected), `send` reports failure and callers stop producing.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StepEvent>,
}

impl EventSink {
    /// Creates a sink and its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Delivers one event. Returns false when the consumer has disconnected;
    /// the event is dropped and further sends will keep failing.
    pub fn send(&self, event: StepEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// True when the consumer is still attached.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Emits `step(generate, complete)` when dropped.
///
/// Created before generation begins so the completion event is emitted on
/// every exit path: normal end, mid-stream error, or early return.
pub struct CompletionGuard {
    sink: EventSink,
}

impl CompletionGuard {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self
            .sink
            .send(StepEvent::step(Stage::Generate, StepStatus::Complete));
    }
}

/// Forwards fragments from `rx` to `sink` as `Content` events, one per
/// fragment, in arrival order.
///
/// Returns once the producer closes the channel or the sink disconnects.
/// No fragment is merged, dropped, or held back; the only buffering is the
/// fragment currently being handed over.
pub async fn relay_fragments(mut rx: mpsc::Receiver<Fragment>, sink: EventSink) {
    while let Some(fragment) = rx.recv().await {
        if !sink.send(StepEvent::content(fragment.text)) {
            // Consumer disconnected: stop delivery, let the producer run out.
            break;
        }
    }
}
