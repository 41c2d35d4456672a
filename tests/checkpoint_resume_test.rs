//! Durable conversation state: file-backed checkpoints, interrupted-turn
//! resume, repair of out-of-range state and per-conversation serialization.

use serde_json::json;
use std::sync::Arc;

use lorekeeper::checkpoint::{
    open_store, BackendConversationStore, ConversationCheckpoint, ConversationStore, Message, PendingTurn, Role,
    ToolInvocationRequest,
};
use lorekeeper::orchestration::test_utils::{ScriptedJudge, StaticRetriever};
use lorekeeper::orchestration::{EngineSettings, TurnEngine, GENERATE_FALLBACK};
use lorekeeper::prompts::PromptId;

const DOBBY: &str = "Dobby is a house-elf who served the Malfoy family.";

fn file_store(dir: &tempfile::TempDir) -> Arc<dyn ConversationStore> {
    open_store("file", Some(dir.path())).unwrap()
}

fn engine(judge: ScriptedJudge, store: Arc<dyn ConversationStore>) -> TurnEngine {
    TurnEngine::new(
        Arc::new(judge),
        Arc::new(StaticRetriever::new([DOBBY])),
        store,
        EngineSettings::default(),
    )
}

/// A graded turn that stopped after the model asked for retrieval.
fn interrupted_checkpoint(id: &str) -> ConversationCheckpoint {
    let mut checkpoint = ConversationCheckpoint::new(id);
    checkpoint.state.messages = vec![
        Message::human("Who is Dobby?"),
        Message::ai_tool_request(
            "",
            vec![ToolInvocationRequest::new(
                "call_1",
                "retrieve_passages",
                json!({"query": "Dobby"}),
            )],
        ),
    ];
    checkpoint.pending = Some(PendingTurn {
        next_node: "retrieve".into(),
        turn_start: 0,
        topology: "graded_retry".into(),
        steps_taken: 1,
    });
    checkpoint.step_count = 1;
    checkpoint
}

#[tokio::test]
async fn test_turn_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = engine(ScriptedJudge::new().answer("Hello!"), file_store(&dir));
    first.run_turn("conv", "hi").await;
    drop(first);

    let judge = Arc::new(ScriptedJudge::new().answer("You greeted me."));
    let second = TurnEngine::new(
        judge.clone(),
        Arc::new(StaticRetriever::new([DOBBY])),
        file_store(&dir),
        EngineSettings::default(),
    );
    let reply = second.run_turn("conv", "what did I say?").await;
    assert_eq!(reply.content(), "You greeted me.");

    let calls = judge.calls().await;
    assert_eq!(calls[0].1["history"], "User: hi\nAssistant: Hello!");

    let checkpoint = file_store(&dir).load("conv").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.messages.len(), 4);
    assert_eq!(checkpoint.step_count, 2);
}

#[tokio::test]
async fn test_resume_finishes_interrupted_turn() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    store.save("conv", &interrupted_checkpoint("conv")).await.unwrap();

    let judge = ScriptedJudge::new()
        .structured(PromptId::Grade, json!({"binary_score": true}))
        .text(PromptId::Generate, "Dobby is a house-elf.");
    let engine = engine(judge, store.clone());

    let reply = engine.resume("conv").await.unwrap();
    assert_eq!(reply.content(), "Dobby is a house-elf.");

    let checkpoint = store.load("conv").await.unwrap().unwrap();
    assert!(checkpoint.pending.is_none());
    assert_eq!(checkpoint.step_count, 4);
    let roles: Vec<Role> = checkpoint.state.messages.iter().map(Message::role).collect();
    assert_eq!(roles, vec![Role::Human, Role::Ai, Role::Tool, Role::Ai]);

    assert!(engine.resume("conv").await.is_none());
}

#[tokio::test]
async fn test_new_message_finishes_pending_turn_first() {
    let store = open_store("memory", None).unwrap();
    store.save("conv", &interrupted_checkpoint("conv")).await.unwrap();

    let judge = ScriptedJudge::new()
        .structured(PromptId::Grade, json!({"binary_score": true}))
        .text(PromptId::Generate, "Dobby is a house-elf.")
        .answer("He was freed with a sock.");
    let engine = engine(judge, store.clone());

    let reply = engine.run_turn("conv", "How was he freed?").await;
    assert_eq!(reply.content(), "He was freed with a sock.");

    let checkpoint = store.load("conv").await.unwrap().unwrap();
    let visible: Vec<String> = checkpoint
        .state
        .visible_messages()
        .map(|m| m.content().to_string())
        .collect();
    assert_eq!(
        visible,
        vec![
            "Who is Dobby?",
            "Dobby is a house-elf.",
            "How was he freed?",
            "He was freed with a sock.",
        ]
    );
}

#[tokio::test]
async fn test_out_of_range_retry_count_is_repaired() {
    let store = open_store("memory", None).unwrap();
    let mut checkpoint = ConversationCheckpoint::new("conv");
    checkpoint.state.messages = vec![Message::human("hi"), Message::ai("Hello!")];
    checkpoint.state.retry_count = 9;
    store.save("conv", &checkpoint).await.unwrap();

    // a repaired counter means grading is consulted instead of skipped
    let judge = ScriptedJudge::new()
        .tool_request("Dobby")
        .structured(PromptId::Grade, json!({"binary_score": true}))
        .text(PromptId::Generate, "Dobby is a house-elf.");
    let engine = engine(judge, store.clone());

    engine.run_turn("conv", "Who is Dobby?").await;
    let checkpoint = store.load("conv").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.retry_count, 0);
    assert_eq!(checkpoint.state.messages.len(), 6);
}

#[tokio::test]
async fn test_pending_turn_from_other_topology_is_dropped() {
    let store = open_store("memory", None).unwrap();
    let mut checkpoint = interrupted_checkpoint("conv");
    if let Some(pending) = checkpoint.pending.as_mut() {
        pending.topology = "two_path".into();
    }
    store.save("conv", &checkpoint).await.unwrap();

    let engine = engine(ScriptedJudge::new(), store.clone());
    assert!(engine.resume("conv").await.is_none());
}

#[tokio::test]
async fn test_dropped_turn_gives_next_turn_full_retry_budget() {
    let store = open_store("memory", None).unwrap();
    let mut checkpoint = interrupted_checkpoint("conv");
    checkpoint
        .state
        .messages
        .push(Message::tool(DOBBY, "call_1", "retrieve_passages"));
    checkpoint.state.retry_count = 2;
    if let Some(pending) = checkpoint.pending.as_mut() {
        pending.topology = "two_path".into();
    }
    store.save("conv", &checkpoint).await.unwrap();

    let judge = Arc::new(
        ScriptedJudge::new()
            .tool_request("Winky")
            .structured(PromptId::Grade, json!({"binary_score": false}))
            .text(PromptId::Rewrite, "Winky the house-elf")
            .tool_request("Winky house-elf")
            .structured(PromptId::Grade, json!({"binary_score": true}))
            .text(PromptId::Generate, "Winky is the Crouch family's house-elf."),
    );
    let engine = TurnEngine::new(
        judge.clone(),
        Arc::new(StaticRetriever::new([DOBBY])),
        store.clone(),
        EngineSettings::default(),
    );

    let reply = engine.run_turn("conv", "Who is Winky?").await;
    assert_eq!(reply.content(), "Winky is the Crouch family's house-elf.");
    assert_eq!(judge.call_count(PromptId::Grade).await, 2);

    let checkpoint = store.load("conv").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.retry_count, 0);
    let visible: Vec<String> = checkpoint
        .state
        .visible_messages()
        .map(|m| m.content().to_string())
        .collect();
    assert_eq!(
        visible,
        vec![
            "Who is Dobby?",
            GENERATE_FALLBACK,
            "Who is Winky?",
            "Winky is the Crouch family's house-elf.",
        ]
    );
}

#[tokio::test]
async fn test_corrupted_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);
    engine(ScriptedJudge::new().answer("Hello!"), store.clone())
        .run_turn("conv", "hi")
        .await;

    let path = dir.path().join(BackendConversationStore::key_for("conv"));
    assert!(path.exists());
    std::fs::write(&path, "{ not json").unwrap();

    let reply = engine(ScriptedJudge::new().answer("Hi again!"), store.clone())
        .run_turn("conv", "hello")
        .await;
    assert_eq!(reply.content(), "Hi again!");

    let checkpoint = store.load("conv").await.unwrap().unwrap();
    assert_eq!(checkpoint.state.messages.len(), 2);
}

#[tokio::test]
async fn test_concurrent_turns_on_one_conversation_are_serialized() {
    let store = open_store("memory", None).unwrap();
    let engine = engine(ScriptedJudge::new().answer("one").answer("two"), store.clone());

    tokio::join!(engine.run_turn("conv", "first"), engine.run_turn("conv", "second"));

    let checkpoint = store.load("conv").await.unwrap().unwrap();
    let roles: Vec<Role> = checkpoint.state.messages.iter().map(Message::role).collect();
    assert_eq!(roles, vec![Role::Human, Role::Ai, Role::Human, Role::Ai]);
}
