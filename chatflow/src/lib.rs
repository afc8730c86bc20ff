//! # chatflow
//!
//! A small conversation pipeline with a streaming relay. One shared state
//! type flows through a fixed sequence of phases — refine the topic, call
//! the model, optionally call a tool and come back — and the model's
//! incremental output is forwarded fragment-by-fragment to a console or
//! network sink, annotated with step-status events.
//!
//! ## Design Principles
//!
//! - **Explicit state machine**: The pipeline is a fixed FSM
//!   (Refining → Generating → AwaitingTool → Generating → Done), not a
//!   generic graph engine; the topology never varies.
//! - **Explicit collaborators**: The model client, tool source, and
//!   checkpoint store are constructor dependencies behind traits, so
//!   executions stay independent and testable in isolation.
//! - **Guaranteed completion event**: Streaming consumers always receive
//!   the `generate complete` step event, enforced by a drop guard; no error
//!   path can skip it.
//!
//! ## Main Modules
//!
//! - [`pipeline`]: [`Pipeline`] — build and run conversations.
//! - [`stream`]: [`StepEvent`], [`EventSink`], fragment relay.
//! - [`llm`]: [`LlmClient`] trait, [`MockLlm`], and `ChatOpenAI` (feature `openai`).
//! - [`tool_source`]: [`ToolSource`] trait, [`MockToolSource`], and `TavilySearch` (feature `tavily`).
//! - [`memory`]: [`Checkpointer`] trait and [`MemorySaver`].
//!
//! ## Quick Start
//!
//! ```rust
//! use chatflow::{ChatState, MockLlm, Pipeline};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pipeline = Pipeline::new(Box::new(MockLlm::with_no_tool_calls("hi there")));
//! let state = pipeline
//!     .run(ChatState::from_user_message("hello"))
//!     .await
//!     .unwrap();
//! assert_eq!(state.last_assistant(), Some("hi there"));
//! # }
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod message;
pub mod pipeline;
pub mod state;
pub mod stream;
pub mod tool_source;

pub use config::LlmConfig;
pub use error::ChatError;
pub use llm::{LlmClient, LlmReply, MockLlm, MockTurn};
#[cfg(feature = "openai")]
pub use llm::ChatOpenAI;
pub use memory::{CheckpointError, Checkpointer, MemorySaver};
pub use message::{Message, ToolCall};
pub use pipeline::{Pipeline, DEFAULT_PROMPT_TEMPLATE, DEFAULT_TOPIC_SUFFIX};
pub use state::ChatState;
pub use stream::{
    relay_fragments, CompletionGuard, EventSink, Fragment, Stage, StepEvent, StepStatus,
};
pub use tool_source::{MockToolSource, ToolOutput, ToolSource, ToolSourceError, ToolSpec};
#[cfg(feature = "tavily")]
pub use tool_source::TavilySearch;
