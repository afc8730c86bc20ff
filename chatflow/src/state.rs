//! Conversation state carried through one pipeline run.
//!
//! `ChatState` is the single state type the pipeline reads and writes:
//! an append-only message list plus an optional topic seed. Messages are
//! never reordered or truncated within a run. Serde-serializable so a
//! `Checkpointer` can persist it keyed by thread id.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// State for one conversation run: optional topic seed plus the message list.
///
/// Owned exclusively by one pipeline execution; when a checkpointer is in
/// play, ownership transfers to the store between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    /// Topic seed for the refine stage; `None` for plain chat turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Ordered conversation history. Append-only within a run.
    pub messages: Vec<Message>,
}

impl ChatState {
    /// Fresh state seeded with a single user message (plain chat, no refine stage).
    pub fn from_user_message(text: impl Into<String>) -> Self {
        Self {
            topic: None,
            messages: vec![Message::user(text)],
        }
    }

    /// Fresh state seeded with a topic; the refine stage builds the prompt.
    pub fn from_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            messages: vec![],
        }
    }

    /// Content of the last assistant message, if any.
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            Message::Assistant { content, .. } => Some(content.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: from_user_message seeds one user message and no topic.
    #[test]
    fn state_from_user_message() {
        let s = ChatState::from_user_message("hi");
        assert!(s.topic.is_none());
        assert_eq!(s.messages.len(), 1);
        assert_eq!(s.messages[0].role(), "user");
    }

    /// **Scenario**: from_topic seeds the topic and an empty message list.
    #[test]
    fn state_from_topic() {
        let s = ChatState::from_topic("兔子");
        assert_eq!(s.topic.as_deref(), Some("兔子"));
        assert!(s.messages.is_empty());
    }

    /// **Scenario**: last_assistant returns the most recent assistant content, skipping tool messages.
    #[test]
    fn state_last_assistant_skips_tool_messages() {
        let mut s = ChatState::from_user_message("q");
        s.messages.push(Message::assistant("first"));
        s.messages.push(Message::tool("tool output", None));
        assert_eq!(s.last_assistant(), Some("first"));
        s.messages.push(Message::assistant("second"));
        assert_eq!(s.last_assistant(), Some("second"));
    }
}
