//! Pipeline execution error types.
//!
//! Used by `Pipeline::run` and the collaborator traits (`LlmClient`,
//! `ToolSource`, `Checkpointer`). Collaborator failures carry the backend
//! message verbatim; there is no retry layer.

use thiserror::Error;

use crate::memory::CheckpointError;
use crate::tool_source::ToolSourceError;

/// Error returned by pipeline execution.
///
/// Collaborator failures (model or tool backend) surface with the backend's
/// own message; the pipeline does not retry or rewrite them.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The model backend failed (unreachable, bad credentials, rate limit, malformed reply).
    #[error("llm call failed: {0}")]
    Llm(String),

    /// A tool invocation failed.
    #[error("tool call failed: {0}")]
    Tool(#[from] ToolSourceError),

    /// Loading or saving conversation state failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The configured tool-turn cap was reached before the model produced a final reply.
    #[error("tool turn limit reached after {0} rounds")]
    ToolTurnLimit(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of Llm contains "llm call failed" and the backend message.
    #[test]
    fn chat_error_display_llm() {
        let err = ChatError::Llm("connection refused".to_string());
        let s = err.to_string();
        assert!(s.contains("llm call failed"), "{}", s);
        assert!(s.contains("connection refused"), "{}", s);
    }

    /// **Scenario**: ToolSourceError converts into ChatError::Tool via From.
    #[test]
    fn chat_error_from_tool_source_error() {
        let err: ChatError = ToolSourceError::Transport("timeout".to_string()).into();
        assert!(matches!(err, ChatError::Tool(_)));
        assert!(err.to_string().contains("timeout"));
    }
}
