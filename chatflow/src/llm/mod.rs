//! LLM client abstraction used by the generate stage.
//!
//! The pipeline depends on a callable that takes the ordered message list
//! and returns assistant text plus optional tool calls — either whole
//! (`invoke`) or as a lazy fragment sequence (`invoke_stream`). This module
//! defines the trait and a scripted mock; `ChatOpenAI` (feature `openai`)
//! talks to a real backend.

mod mock;

#[cfg(feature = "openai")]
mod openai;

pub use mock::{MockLlm, MockTurn};

#[cfg(feature = "openai")]
pub use openai::ChatOpenAI;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::message::{Message, ToolCall};
use crate::stream::Fragment;

/// Reply from one model call: assistant text and any tool calls.
///
/// Empty `tool_calls` means the model answered directly and the pipeline can
/// terminate; non-empty routes control to the tool stage.
#[derive(Debug, Clone, Default)]
pub struct LlmReply {
    /// Assistant message content (plain text).
    pub content: String,
    /// Tool calls requested this turn; empty means no tools.
    pub tool_calls: Vec<ToolCall>,
}

/// Model backend: given messages, returns assistant text and optional tool calls.
///
/// Single-attempt semantics: implementations do not retry, and failures
/// surface verbatim as [`ChatError::Llm`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One complete turn: read messages, return the full reply.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmReply, ChatError>;

    /// Streaming turn: deliver fragments through `fragments` as they are
    /// produced, then return the assembled reply.
    ///
    /// The default degrades to [`invoke`](Self::invoke), delivering the whole
    /// reply as a single fragment. Implementations must send fragments in
    /// production order and must not hold fragments back to batch them.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<Fragment>,
    ) -> Result<LlmReply, ChatError> {
        let reply = self.invoke(messages).await?;
        if !reply.content.is_empty() {
            let _ = fragments
                .send(Fragment {
                    text: reply.content.clone(),
                })
                .await;
        }
        Ok(reply)
    }
}
