//! In-memory checkpoint store for dev and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::state::ChatState;

use super::{CheckpointError, Checkpointer};

/// Mutex-guarded in-memory map of thread id to latest state.
///
/// Suitable for demos and tests; nothing survives the process (durable
/// storage is out of scope for this crate).
#[derive(Default)]
pub struct MemorySaver {
    threads: Mutex<HashMap<String, ChatState>>,
}

impl MemorySaver {
    /// Creates an empty saver.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn load(&self, thread_id: &str) -> Result<Option<ChatState>, CheckpointError> {
        let threads = self
            .threads
            .lock()
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(threads.get(thread_id).cloned())
    }

    async fn save(&self, thread_id: &str, state: &ChatState) -> Result<(), CheckpointError> {
        let mut threads = self
            .threads
            .lock()
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        threads.insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    /// **Scenario**: load on a fresh thread returns None; after save it returns the state.
    #[tokio::test]
    async fn memory_saver_roundtrip() {
        let saver = MemorySaver::new();
        assert!(saver.load("t1").await.unwrap().is_none());

        let state = ChatState::from_user_message("hello");
        saver.save("t1", &state).await.unwrap();
        let loaded = saver.load("t1").await.unwrap().expect("saved state");
        assert_eq!(loaded, state);
    }

    /// **Scenario**: Threads are isolated; saving one key does not leak into another.
    #[tokio::test]
    async fn memory_saver_isolates_threads() {
        let saver = MemorySaver::new();
        let mut s1 = ChatState::from_user_message("one");
        s1.messages.push(Message::assistant("a1"));
        saver.save("t1", &s1).await.unwrap();
        assert!(saver.load("t2").await.unwrap().is_none());

        let s2 = ChatState::from_user_message("two");
        saver.save("t2", &s2).await.unwrap();
        assert_eq!(saver.load("t1").await.unwrap().unwrap(), s1);
        assert_eq!(saver.load("t2").await.unwrap().unwrap(), s2);
    }
}
