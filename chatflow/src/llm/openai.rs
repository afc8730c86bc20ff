//! OpenAI Chat Completions client implementing `LlmClient` (ChatOpenAI).
//!
//! Talks to any OpenAI-compatible backend (OpenAI, OpenRouter, Zhipu) using
//! the key/base/model from [`LlmConfig`](crate::config::LlmConfig). Optional
//! tools enable `tool_calls` in the reply; `invoke_stream` uses the
//! chat-completions streaming API and forwards each delta as one fragment.
//!
//! Depends on `async_openai` (feature `openai`).

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::config::LlmConfig;
use crate::error::ChatError;
use crate::message::{Message, ToolCall};
use crate::stream::Fragment;
use crate::tool_source::ToolSpec;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessage, ChatCompletionRequestUserMessage, ChatCompletionTool,
        ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObject,
    },
    Client,
};

use super::{LlmClient, LlmReply};

/// OpenAI Chat Completions client implementing `LlmClient`.
///
/// Reads nothing from the environment itself; build it from an
/// [`LlmConfig`] so pipeline executions stay independent and testable.
/// Optionally set tools (e.g. from `ToolSource::list_tools()`) to enable
/// tool calls in the reply.
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    tools: Option<Vec<ToolSpec>>,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    /// Builds a client from model/key/base config. Missing key or base is
    /// passed through and fails at the first call, not here.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut openai_config = OpenAIConfig::new();
        if let Some(ref key) = config.api_key {
            openai_config = openai_config.with_api_key(key.clone());
        }
        if let Some(ref base) = config.api_base {
            // Strip the trailing slash so base + "/chat/completions" does not
            // produce a double slash (some backends reject it).
            openai_config = openai_config.with_api_base(base.trim_end_matches('/'));
        }
        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            tools: None,
            temperature: config.temperature,
        }
    }

    /// Sets tools for completions (enables tool_calls in the reply).
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Sets the sampling temperature (0-2). Lower values are more deterministic.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Converts our `Message` list to OpenAI request messages.
    fn messages_to_request(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { content } => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessage::from(content.as_str()),
                ),
                Message::User { content } => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessage::from(content.as_str()),
                ),
                Message::Assistant { content, .. } => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage::from(content.as_str()),
                ),
                Message::Tool { content, call_id } => {
                    ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                        content: content.as_str().into(),
                        tool_call_id: call_id.clone().unwrap_or_default(),
                    })
                }
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        stream: bool,
    ) -> Result<async_openai::types::chat::CreateChatCompletionRequest, ChatError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::messages_to_request(messages));
        if stream {
            args.stream(true);
        }

        if let Some(ref tools) = self.tools {
            let chat_tools: Vec<ChatCompletionTools> = tools
                .iter()
                .map(|t| {
                    ChatCompletionTools::Function(ChatCompletionTool {
                        function: FunctionObject {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: Some(t.input_schema.clone()),
                            ..Default::default()
                        },
                    })
                })
                .collect();
            args.tools(chat_tools);
        }

        if let Some(t) = self.temperature {
            args.temperature(t);
        }

        args.build()
            .map_err(|e| ChatError::Llm(format!("request build failed: {}", e)))
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmReply, ChatError> {
        let request = self.build_request(messages, false)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ChatError::Llm(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Llm("OpenAI returned no choices".to_string()))?;

        let msg = choice.message;
        let content = msg.content.unwrap_or_default();
        let tool_calls: Vec<ToolCall> = msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tc| {
                if let ChatCompletionMessageToolCalls::Function(f) = tc {
                    Some(ToolCall {
                        name: f.function.name,
                        arguments: f.function.arguments,
                        id: Some(f.id),
                    })
                } else {
                    None
                }
            })
            .collect();

        Ok(LlmReply {
            content,
            tool_calls,
        })
    }

    /// Streams the completion, forwarding each content delta as one fragment
    /// the moment it arrives. Tool-call deltas are accumulated by index and
    /// returned in the assembled reply.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        fragments: mpsc::Sender<Fragment>,
    ) -> Result<LlmReply, ChatError> {
        let request = self.build_request(messages, true)?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| ChatError::Llm(format!("OpenAI API error: {}", e)))?;

        let mut content = String::new();
        let mut partial_calls: Vec<PartialToolCall> = Vec::new();

        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| ChatError::Llm(format!("OpenAI stream error: {}", e)))?;
            let Some(choice) = chunk.choices.into_iter().next() else {
                continue;
            };
            if let Some(text) = choice.delta.content {
                if !text.is_empty() {
                    content.push_str(&text);
                    // Consumer gone is not an error: keep draining so the
                    // assembled reply is still complete.
                    let _ = fragments.send(Fragment { text }).await;
                }
            }
            if let Some(call_chunks) = choice.delta.tool_calls {
                for tc in call_chunks {
                    let index = tc.index as usize;
                    if partial_calls.len() <= index {
                        partial_calls.resize_with(index + 1, PartialToolCall::default);
                    }
                    let slot = &mut partial_calls[index];
                    if let Some(id) = tc.id {
                        slot.id = Some(id);
                    }
                    if let Some(f) = tc.function {
                        if let Some(name) = f.name {
                            slot.name.push_str(&name);
                        }
                        if let Some(arguments) = f.arguments {
                            slot.arguments.push_str(&arguments);
                        }
                    }
                }
            }
        }

        let tool_calls = partial_calls
            .into_iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| ToolCall {
                name: p.name,
                arguments: p.arguments,
                id: p.id,
            })
            .collect();

        Ok(LlmReply {
            content,
            tool_calls,
        })
    }
}

/// Tool call under assembly from streamed deltas, keyed by choice index.
#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}
