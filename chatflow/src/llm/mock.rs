//! Scripted mock LLM for tests and offline runs.
//!
//! Turns are consumed in order; each turn can carry content, tool calls, an
//! explicit fragment script for streaming, and an injectable mid-stream
//! failure. The mock records every message list it receives so tests can
//! assert on the prompt that reached the model.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::message::{Message, ToolCall};
use crate::stream::Fragment;

use super::{LlmClient, LlmReply};

/// One scripted model turn.
#[derive(Debug, Clone, Default)]
pub struct MockTurn {
    /// Assistant content returned for this turn.
    pub content: String,
    /// Tool calls returned for this turn.
    pub tool_calls: Vec<ToolCall>,
    /// Fragment script for `invoke_stream`; empty means the whole content is
    /// delivered as one fragment.
    pub fragments: Vec<String>,
    /// When set, the call fails with this message — for `invoke_stream`,
    /// after the scripted fragments have been delivered.
    pub error: Option<String>,
}

impl MockTurn {
    /// A plain reply with no tool calls.
    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A reply requesting one tool call.
    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments: arguments.into(),
                id: Some("call-1".to_string()),
            }],
            ..Self::default()
        }
    }

    /// Sets the fragment script delivered by `invoke_stream`.
    pub fn with_fragments(mut self, fragments: &[&str]) -> Self {
        self.fragments = fragments.iter().map(|s| s.to_string()).collect();
        self.content = self.fragments.concat();
        self
    }

    /// Makes the turn fail after its fragments have been delivered.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Mock LLM: pops one scripted turn per call, records received messages.
pub struct MockLlm {
    turns: Mutex<VecDeque<MockTurn>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlm {
    /// Builds a mock from a turn script.
    pub fn new(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Single turn, plain text, no tool calls.
    pub fn with_no_tool_calls(content: impl Into<String>) -> Self {
        Self::new(vec![MockTurn::reply(content)])
    }

    /// Single turn streamed as the given fragments.
    pub fn with_fragments(fragments: &[&str]) -> Self {
        Self::new(vec![MockTurn::default().with_fragments(fragments)])
    }

    /// Message lists received so far, one entry per call.
    pub fn recorded_calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next_turn(&self, messages: &[Message]) -> MockTurn {
        self.calls
            .lock()
            .expect("calls lock")
            .push(messages.to_vec());
        self.turns
            .lock()
            .expect("turns lock")
            .pop_front()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmReply, ChatError> {
        let turn = self.next_turn(messages);
        if let Some(message) = turn.error {
            return Err(ChatError::Llm(message));
        }
        Ok(LlmReply {
            content: turn.content,
            tool_calls: turn.tool_calls,
        })
    }

    async fn invoke_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<Fragment>,
    ) -> Result<LlmReply, ChatError> {
        let turn = self.next_turn(messages);
        let script = if turn.fragments.is_empty() && !turn.content.is_empty() {
            vec![turn.content.clone()]
        } else {
            turn.fragments.clone()
        };
        for text in script {
            let _ = fragments.send(Fragment { text }).await;
        }
        if let Some(message) = turn.error {
            return Err(ChatError::Llm(message));
        }
        Ok(LlmReply {
            content: turn.content,
            tool_calls: turn.tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Turns are consumed in script order and calls are recorded.
    #[tokio::test]
    async fn mock_llm_pops_turns_in_order_and_records_calls() {
        let llm = MockLlm::new(vec![MockTurn::reply("one"), MockTurn::reply("two")]);
        let msgs = vec![Message::user("hi")];
        let first = llm.invoke(&msgs).await.unwrap();
        let second = llm.invoke(&msgs).await.unwrap();
        assert_eq!(first.content, "one");
        assert_eq!(second.content, "two");
        assert_eq!(llm.recorded_calls().len(), 2);
    }

    /// **Scenario**: invoke_stream delivers the fragment script in order, then the reply.
    #[tokio::test]
    async fn mock_llm_streams_scripted_fragments() {
        let llm = MockLlm::with_fragments(&["你", "好"]);
        let (tx, mut rx) = mpsc::channel(8);
        let reply = llm.invoke_stream(&[Message::user("hi")], tx).await.unwrap();
        assert_eq!(reply.content, "你好");
        assert_eq!(rx.recv().await.unwrap().text, "你");
        assert_eq!(rx.recv().await.unwrap().text, "好");
        assert!(rx.recv().await.is_none());
    }

    /// **Scenario**: A turn with an error fails after its fragments are delivered.
    #[tokio::test]
    async fn mock_llm_errors_after_fragments() {
        let llm = MockLlm::new(vec![MockTurn::default()
            .with_fragments(&["a"])
            .with_error("backend down")]);
        let (tx, mut rx) = mpsc::channel(8);
        let err = llm
            .invoke_stream(&[Message::user("hi")], tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("backend down"));
        assert_eq!(rx.recv().await.unwrap().text, "a");
        assert!(rx.recv().await.is_none());
    }

    /// **Scenario**: An exhausted script yields empty replies instead of panicking.
    #[tokio::test]
    async fn mock_llm_exhausted_script_returns_default() {
        let llm = MockLlm::new(vec![]);
        let reply = llm.invoke(&[Message::user("hi")]).await.unwrap();
        assert!(reply.content.is_empty());
        assert!(reply.tool_calls.is_empty());
    }
}
