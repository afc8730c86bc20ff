//! Tool source: specs the model can bind and an executor for tool calls.
//!
//! The pipeline invokes a tool only when the model's reply requests it; one
//! invocation per tool call, one tool message appended per invocation.
//! Implementations: [`MockToolSource`] (fixed result, records calls) and
//! `TavilySearch` (real web search, feature `tavily`).

mod mock;

#[cfg(feature = "tavily")]
mod tavily;

pub use mock::MockToolSource;

#[cfg(feature = "tavily")]
pub use tavily::TavilySearch;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Description of one callable tool, shaped for chat-completion tool binding.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name, e.g. "web_search".
    pub name: String,
    /// Description shown to the model.
    pub description: Option<String>,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
}

/// Result of one tool invocation, rendered as text for the tool message.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
}

/// Errors from listing or invoking tools.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    /// Arguments were missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The backend was unreachable or returned a failure status.
    #[error("transport error: {0}")]
    Transport(String),
    /// The model requested a tool this source does not provide.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Tool executor: lists available tools and runs one call at a time.
///
/// Single-attempt semantics; failures surface verbatim to the pipeline.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Tools this source provides, for binding into the model request.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    /// Executes one tool call with parsed JSON arguments.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolSourceError>;
}
