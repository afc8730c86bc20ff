//! Role-tagged conversation messages.
//!
//! One `Message` per turn entry; immutable once created. The assistant
//! variant carries tool calls when the model requests them, and the tool
//! variant carries the result of one tool invocation. Serde-serializable so
//! checkpoint stores can persist whole conversations as JSON.

use serde::{Deserialize, Serialize};

/// A structured tool request embedded in a model reply.
///
/// `arguments` is the raw JSON string as received from the backend; the
/// pipeline parses it only when dispatching to a `ToolSource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name, e.g. "web_search".
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
    /// Backend-assigned call id; echoed back in the tool message when present.
    pub id: Option<String>,
}

/// One conversation message: role plus content, immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// System instruction, first in a fresh conversation.
    System { content: String },
    /// End-user input for one turn.
    User { content: String },
    /// Model reply; `tool_calls` is non-empty when the model requests tools.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Result of one tool invocation, appended before control returns to the model.
    Tool {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant message without tool calls.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: vec![],
        }
    }

    /// Creates an assistant message carrying tool calls.
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Creates a tool-result message.
    pub fn tool(content: impl Into<String>, call_id: Option<String>) -> Self {
        Self::Tool {
            content: content.into(),
            call_id,
        }
    }

    /// The message text, independent of role.
    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Role tag as it appears on the wire.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }
}
