//! Conversation memory: per-thread checkpoint store.
//!
//! The pipeline loads the accumulated conversation before the first step and
//! saves it after the last, keyed by an opaque thread id. The store owns the
//! state between runs; no locking, versioning or conflict resolution is
//! promised beyond single-writer-per-thread — implementations are
//! responsible for their own interior thread safety.

mod memory_saver;

pub use memory_saver::MemorySaver;

use async_trait::async_trait;
use thiserror::Error;

use crate::state::ChatState;

/// Errors from loading or saving conversation state.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// State could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// The backing store failed.
    #[error("storage failed: {0}")]
    Storage(String),
}

/// Checkpoint store: load and save one conversation keyed by thread id.
///
/// The thread id is an opaque lookup key, never interpreted.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Latest state for the thread, or `None` when the thread is new.
    async fn load(&self, thread_id: &str) -> Result<Option<ChatState>, CheckpointError>;

    /// Stores the state as the thread's latest snapshot.
    async fn save(&self, thread_id: &str, state: &ChatState) -> Result<(), CheckpointError>;
}
