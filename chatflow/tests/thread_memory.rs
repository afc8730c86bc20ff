//! Integration tests for memory-backed thread runs.
//!
//! **Scenario family**: run consecutive turns through a MemorySaver-backed
//! pipeline and assert the prefix-preserving superset property: every turn's
//! model input starts with the previous turn's saved messages.

use std::sync::Arc;

use async_trait::async_trait;
use chatflow::{
    ChatError, ChatState, Checkpointer, LlmClient, LlmReply, MemorySaver, Message, MockLlm,
    Pipeline,
};

/// Wrapper that shares the mock so the test can read recorded calls after
/// the pipeline takes ownership of the Box.
struct SharedLlm(Arc<MockLlm>);

#[async_trait]
impl LlmClient for SharedLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmReply, ChatError> {
        self.0.invoke(messages).await
    }
}

/// **Scenario**: turn 2 under the same thread id sees a message list that is
/// a prefix-preserving superset of turn 1's final state plus the new input.
#[tokio::test]
async fn second_turn_extends_first_turns_messages() {
    let llm = Arc::new(MockLlm::new(vec![
        chatflow::MockTurn::reply("Hi Will, nice to meet you."),
        chatflow::MockTurn::reply("Your name is Will."),
    ]));
    let saver: Arc<dyn Checkpointer> = Arc::new(MemorySaver::new());
    let pipeline = Pipeline::new(Box::new(SharedLlm(llm.clone())))
        .with_checkpointer(Arc::clone(&saver));

    let s1 = pipeline
        .run_thread("1", "Hi there! My name is Will.")
        .await
        .unwrap();
    let s2 = pipeline
        .run_thread("1", "Remember my name?")
        .await
        .unwrap();

    // The model's second input starts with everything turn 1 accumulated.
    let calls = llm.recorded_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(&calls[1][..s1.messages.len()], &s1.messages[..]);
    assert_eq!(
        calls[1].last().unwrap(),
        &Message::user("Remember my name?")
    );

    // And the saved state reflects both turns.
    assert_eq!(&s2.messages[..s1.messages.len()], &s1.messages[..]);
    assert_eq!(s2.last_assistant(), Some("Your name is Will."));
}

/// **Scenario**: distinct thread ids do not see each other's history.
#[tokio::test]
async fn threads_are_isolated() {
    let llm = Arc::new(MockLlm::new(vec![
        chatflow::MockTurn::reply("a"),
        chatflow::MockTurn::reply("b"),
    ]));
    let saver: Arc<dyn Checkpointer> = Arc::new(MemorySaver::new());
    let pipeline = Pipeline::new(Box::new(SharedLlm(llm.clone())))
        .with_checkpointer(Arc::clone(&saver));

    pipeline.run_thread("t1", "first").await.unwrap();
    pipeline.run_thread("t2", "second").await.unwrap();

    let calls = llm.recorded_calls();
    assert_eq!(calls[1].len(), 1, "fresh thread starts from scratch");
    assert_eq!(calls[1][0], Message::user("second"));
}

/// **Scenario**: the saved state for a thread equals the run's final state,
/// so a later process (or saver) sees exactly what the caller saw.
#[tokio::test]
async fn saved_state_matches_final_state() {
    let saver = Arc::new(MemorySaver::new());
    let pipeline = Pipeline::new(Box::new(MockLlm::with_no_tool_calls("ok")))
        .with_checkpointer(saver.clone() as Arc<dyn Checkpointer>);

    let final_state = pipeline.run_thread("t", "hello").await.unwrap();
    let loaded = saver.load("t").await.unwrap().expect("saved");
    assert_eq!(loaded, final_state);
}

/// **Scenario**: a configured system prompt seeds fresh threads only; it is
/// not re-inserted on the second turn.
#[tokio::test]
async fn system_prompt_seeds_fresh_threads_once() {
    let llm = Arc::new(MockLlm::new(vec![
        chatflow::MockTurn::reply("a"),
        chatflow::MockTurn::reply("b"),
    ]));
    let pipeline = Pipeline::new(Box::new(SharedLlm(llm.clone())))
        .with_checkpointer(Arc::new(MemorySaver::new()))
        .with_system_prompt("You are terse.");

    pipeline.run_thread("t", "one").await.unwrap();
    pipeline.run_thread("t", "two").await.unwrap();

    let calls = llm.recorded_calls();
    assert_eq!(calls[0][0], Message::system("You are terse."));
    let system_count = calls[1].iter().filter(|m| m.role() == "system").count();
    assert_eq!(system_count, 1);
}

/// **Scenario**: state carried into a new run stays append-only — the run
/// never reorders or truncates the loaded history.
#[tokio::test]
async fn history_is_append_only_across_turns() {
    let llm = Arc::new(MockLlm::new(vec![
        chatflow::MockTurn::reply("r1"),
        chatflow::MockTurn::reply("r2"),
        chatflow::MockTurn::reply("r3"),
    ]));
    let pipeline = Pipeline::new(Box::new(SharedLlm(llm.clone())))
        .with_checkpointer(Arc::new(MemorySaver::new()));

    let mut previous: Vec<Message> = Vec::new();
    for turn in ["one", "two", "three"] {
        let state = pipeline.run_thread("t", turn).await.unwrap();
        assert_eq!(&state.messages[..previous.len()], &previous[..]);
        assert!(state.messages.len() > previous.len());
        previous = state.messages;
    }
}
