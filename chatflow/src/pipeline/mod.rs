//! Conversation pipeline: a fixed finite-state machine over one `ChatState`.
//!
//! Phases {Refining, Generating, AwaitingTool, Done} with a static
//! transition table: Refining → Generating; Generating → AwaitingTool when
//! the model reply carries tool calls, else → Done; AwaitingTool →
//! Generating. Refining runs only when the state carries a topic seed.
//!
//! One pipeline execution is strictly sequential; the only I/O is the calls
//! to the model and tool collaborators. In streaming mode the model's
//! fragments are relayed through [`EventSink`] under the step protocol, and
//! the `generate complete` event is guaranteed by [`CompletionGuard`] on
//! every exit path.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ChatError;
use crate::llm::{LlmClient, LlmReply};
use crate::memory::Checkpointer;
use crate::message::{Message, ToolCall};
use crate::state::ChatState;
use crate::stream::{
    relay_fragments, CompletionGuard, EventSink, Fragment, Stage, StepEvent, StepStatus,
};
use crate::tool_source::{ToolSource, ToolSourceError};

/// Suffix the refine phase appends to the topic seed.
pub const DEFAULT_TOPIC_SUFFIX: &str = " 和猫";

/// Prompt pushed as the user message after refine; `{topic}` is substituted
/// with the refined topic.
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "请生成一个关于{topic}的中文笑话，要求：\n1. 笑话要简短有趣\n2. 使用中文回答\n3. 直接给出笑话内容，不要加任何前缀";

/// Pipeline phase. The transition table lives in [`Pipeline::drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Refining,
    Generating,
    AwaitingTool,
    Done,
}

/// Fixed conversation pipeline over model and tool collaborators.
///
/// Build with [`Pipeline::new`] and the `with_*` setters, then call
/// [`run`](Self::run) / [`run_streaming`](Self::run_streaming) for a single
/// state, or the `run_thread*` variants to go through the checkpoint store.
///
/// Collaborators are explicit constructor dependencies, so two executions of
/// the same pipeline share no mutable state.
pub struct Pipeline {
    llm: Box<dyn LlmClient>,
    tools: Option<Box<dyn ToolSource>>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    system_prompt: Option<String>,
    topic_suffix: String,
    prompt_template: String,
    /// Tool-round cap; `None` preserves the observed unbounded behavior.
    max_tool_turns: Option<u32>,
}

impl Pipeline {
    /// Creates a pipeline around the given model client, with no tools,
    /// no memory, and the default refine behavior.
    pub fn new(llm: Box<dyn LlmClient>) -> Self {
        Self {
            llm,
            tools: None,
            checkpointer: None,
            system_prompt: None,
            topic_suffix: DEFAULT_TOPIC_SUFFIX.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            max_tool_turns: None,
        }
    }

    /// Attaches a tool source; tool calls in model replies are dispatched to it.
    pub fn with_tools(mut self, tools: Box<dyn ToolSource>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Attaches a checkpoint store used by the `run_thread*` variants.
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Seeds fresh threads with a system message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Overrides the suffix the refine phase appends to the topic.
    pub fn with_topic_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.topic_suffix = suffix.into();
        self
    }

    /// Overrides the generation prompt template (`{topic}` is substituted).
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    /// Caps tool rounds per run. Without a cap the loop is unbounded: a model
    /// that keeps requesting tools keeps the run alive.
    pub fn with_max_tool_turns(mut self, max_tool_turns: u32) -> Self {
        self.max_tool_turns = Some(max_tool_turns);
        self
    }

    /// Runs the pipeline to completion and returns the final state.
    pub async fn run(&self, state: ChatState) -> Result<ChatState, ChatError> {
        self.drive(state, None).await
    }

    /// Runs the pipeline, relaying model output and step events to `sink`.
    ///
    /// Event order per run: optional `refine` start/complete pair, one
    /// `generate` start, one `content` per fragment in arrival order, one
    /// `error` on failure, and exactly one `generate` complete — also when
    /// the model call failed or the consumer disconnected.
    pub async fn run_streaming(
        &self,
        state: ChatState,
        sink: &EventSink,
    ) -> Result<ChatState, ChatError> {
        self.drive(state, Some(sink)).await
    }

    /// Memory-backed run: loads the thread's state (or starts fresh), appends
    /// the user message, runs, and saves the final state.
    pub async fn run_thread(
        &self,
        thread_id: &str,
        user_message: &str,
    ) -> Result<ChatState, ChatError> {
        let state = self.thread_state(thread_id, user_message).await?;
        let final_state = self.run(state).await?;
        self.persist(thread_id, &final_state).await?;
        Ok(final_state)
    }

    /// Streaming variant of [`run_thread`](Self::run_thread).
    pub async fn run_thread_streaming(
        &self,
        thread_id: &str,
        user_message: &str,
        sink: &EventSink,
    ) -> Result<ChatState, ChatError> {
        let state = self.thread_state(thread_id, user_message).await?;
        let final_state = self.run_streaming(state, sink).await?;
        self.persist(thread_id, &final_state).await?;
        Ok(final_state)
    }

    /// The FSM driver shared by streaming and non-streaming runs.
    async fn drive(
        &self,
        mut state: ChatState,
        sink: Option<&EventSink>,
    ) -> Result<ChatState, ChatError> {
        let mut phase = if state.topic.is_some() {
            Phase::Refining
        } else {
            Phase::Generating
        };
        // Created on first entry into Generating; emits generate/complete on
        // drop so no exit path can skip it.
        let mut guard: Option<CompletionGuard> = None;
        let mut tool_turns: u32 = 0;

        let outcome = loop {
            match phase {
                Phase::Refining => {
                    emit(sink, StepEvent::step(Stage::Refine, StepStatus::Start));
                    let refined = self.refine_topic(&mut state);
                    debug!(topic = %refined, "topic refined");
                    emit(
                        sink,
                        StepEvent::step_with_result(Stage::Refine, StepStatus::Complete, refined),
                    );
                    phase = Phase::Generating;
                }
                Phase::Generating => {
                    if guard.is_none() {
                        if let Some(s) = sink {
                            guard = Some(CompletionGuard::new(s.clone()));
                        }
                        emit(sink, StepEvent::step(Stage::Generate, StepStatus::Start));
                    }
                    let reply = match self.model_step(&state.messages, sink).await {
                        Ok(reply) => reply,
                        Err(e) => break Err(e),
                    };
                    let has_calls = !reply.tool_calls.is_empty();
                    debug!(tool_calls = reply.tool_calls.len(), "model replied");
                    state.messages.push(if has_calls {
                        Message::assistant_with_calls(reply.content, reply.tool_calls)
                    } else {
                        Message::assistant(reply.content)
                    });
                    phase = if has_calls {
                        Phase::AwaitingTool
                    } else {
                        Phase::Done
                    };
                }
                Phase::AwaitingTool => {
                    if let Some(cap) = self.max_tool_turns {
                        if tool_turns >= cap {
                            break Err(ChatError::ToolTurnLimit(cap));
                        }
                    }
                    tool_turns += 1;
                    if let Err(e) = self.tool_step(&mut state).await {
                        break Err(e);
                    }
                    phase = Phase::Generating;
                }
                Phase::Done => break Ok(()),
            }
        };

        if let Err(ref e) = outcome {
            emit(sink, StepEvent::error(e.to_string()));
        }
        // Guard drops here: exactly one generate/complete, after any error event.
        drop(guard);

        outcome.map(|()| state)
    }

    /// Refine phase: append the fixed suffix to the topic and push the
    /// generation prompt as a user message. Returns the refined topic.
    fn refine_topic(&self, state: &mut ChatState) -> String {
        let topic = state.topic.take().unwrap_or_default();
        let refined = format!("{}{}", topic, self.topic_suffix);
        state.topic = Some(refined.clone());
        let prompt = self.prompt_template.replace("{topic}", &refined);
        state.messages.push(Message::user(prompt));
        refined
    }

    /// One model call. In streaming mode, fragments flow through a bounded
    /// channel to a forwarding task that turns each into a content event.
    async fn model_step(
        &self,
        messages: &[Message],
        sink: Option<&EventSink>,
    ) -> Result<LlmReply, ChatError> {
        match sink {
            Some(sink) => {
                let (fragment_tx, fragment_rx) = mpsc::channel::<Fragment>(128);
                let forward = tokio::spawn(relay_fragments(fragment_rx, sink.clone()));
                let result = self.llm.invoke_stream(messages, fragment_tx).await;
                // fragment_tx is dropped by invoke_stream; wait for the tail
                // fragments to reach the sink before reporting back.
                let _ = forward.await;
                result
            }
            None => self.llm.invoke(messages).await,
        }
    }

    /// Tool phase: one invocation per tool call in the last assistant
    /// message, one tool message appended per invocation.
    async fn tool_step(&self, state: &mut ChatState) -> Result<(), ChatError> {
        let Some(tools) = self.tools.as_deref() else {
            return Err(ChatError::Tool(ToolSourceError::UnknownTool(
                "no tool source configured".to_string(),
            )));
        };
        let calls: Vec<ToolCall> = match state.messages.last() {
            Some(Message::Assistant { tool_calls, .. }) => tool_calls.clone(),
            _ => vec![],
        };
        for call in calls {
            let arguments: Value = if call.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.arguments).map_err(|e| {
                    ToolSourceError::InvalidInput(format!("bad tool arguments: {}", e))
                })?
            };
            debug!(tool = %call.name, "dispatching tool call");
            let output = tools.call_tool(&call.name, arguments).await?;
            state.messages.push(Message::tool(output.text, call.id));
        }
        Ok(())
    }

    /// Initial state for a thread turn: latest checkpoint plus the new user
    /// message, or a fresh state when the thread is new (or memory is off).
    async fn thread_state(
        &self,
        thread_id: &str,
        user_message: &str,
    ) -> Result<ChatState, ChatError> {
        if let Some(cp) = &self.checkpointer {
            if let Some(mut state) = cp.load(thread_id).await? {
                state.messages.push(Message::user(user_message));
                return Ok(state);
            }
        }
        let mut state = ChatState::default();
        if let Some(ref prompt) = self.system_prompt {
            state.messages.push(Message::system(prompt.clone()));
        }
        state.messages.push(Message::user(user_message));
        Ok(state)
    }

    async fn persist(&self, thread_id: &str, state: &ChatState) -> Result<(), ChatError> {
        if let Some(cp) = &self.checkpointer {
            cp.save(thread_id, state).await?;
        }
        Ok(())
    }
}

fn emit(sink: Option<&EventSink>, event: StepEvent) {
    if let Some(sink) = sink {
        // A closed sink means the consumer went away; delivery just stops.
        let _ = sink.send(event);
    }
}
