//! End-to-end tests for the VicAgent conversation pipeline.
//!
//! These drive a whole session, from user input through streamed fragments
//! and tool calls to the saved history, against a scripted provider.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use vicagent_agent::{
    AgentStreamEvent, ITERATION_LIMIT_NOTICE, Session, SystemPrompt, THINKING_CLOSE,
    THINKING_OPEN, TurnAccumulator, TurnOutcome,
};
use vicagent_config::AppConfig;
use vicagent_core::error::ProviderError;
use vicagent_core::fragment::{Fragment, ReasoningDelta};
use vicagent_core::memory::ConversationMemory;
use vicagent_core::message::{MessageToolCall, Role};
use vicagent_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
use vicagent_core::tool::ToolRegistry;
use vicagent_memory::{FileMemory, WindowMemory};
use vicagent_tools::time::CurrentTimeTool;

// ── Scripted provider ────────────────────────────────────────────────────

type Script = Vec<Result<StreamChunk, ProviderError>>;

/// Streams one script per call and records every request.
struct ScriptedProvider {
    scripts: Mutex<Vec<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("streaming only".into()))
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = {
            let mut scripts = self.scripts.lock().unwrap();
            assert!(!scripts.is_empty(), "ScriptedProvider exhausted");
            scripts.remove(0)
        };
        let (tx, rx) = mpsc::channel(script.len().max(1));
        for chunk in script {
            tx.send(chunk).await.unwrap();
        }
        Ok(rx)
    }
}

fn chunk(fragment: Fragment) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk::fragment(fragment))
}

fn signature(sig: &str) -> Result<StreamChunk, ProviderError> {
    chunk(Fragment::Reasoning(ReasoningDelta::Signature(sig.into())))
}

fn finish(tool_calls: Vec<MessageToolCall>) -> Result<StreamChunk, ProviderError> {
    Ok(StreamChunk {
        tool_calls,
        done: true,
        usage: Some(Usage::new(100, 20)),
        ..StreamChunk::default()
    })
}

fn time_call(id: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: "get_current_time".into(),
        arguments: "{}".into(),
    }
}

fn session_with(
    provider: Arc<ScriptedProvider>,
    memory: Arc<dyn ConversationMemory>,
    config: AppConfig,
) -> Session {
    let mut tools = ToolRegistry::new();
    tools.register(Box::new(CurrentTimeTool));
    Session::new(
        config,
        provider,
        Arc::new(tools),
        memory,
        &SystemPrompt::new("Anna").with_liturgy("Third Sunday of Lent (violet)"),
    )
    .unwrap()
}

async fn collect(mut rx: mpsc::Receiver<AgentStreamEvent>) -> Vec<AgentStreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

// ── Classifier scenarios ─────────────────────────────────────────────────

#[test]
fn e2e_reasoning_then_text() {
    let mut acc = TurnAccumulator::default();
    acc.process_raw(&serde_json::json!([
        {"type": "reasoning_content", "reasoning_content": {"type": "text", "text": "pondering"}},
        {"type": "text", "text": "42"}
    ]));
    assert_eq!(acc.answer_text(), "42");
    assert_eq!(
        acc.thinking_text(),
        format!("{THINKING_OPEN}pondering{THINKING_CLOSE}")
    );
}

#[test]
fn e2e_tool_result_then_text() {
    let mut acc = TurnAccumulator::default();
    acc.process(Fragment::tool_result("7"));
    let view = acc.process(Fragment::text(" is the answer"));
    assert_eq!(view.answer_text, "7 is the answer");
    assert!(view.thinking_text.is_empty());
}

// ── Full turns ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_thinking_tool_use_and_answer() {
    let provider = ScriptedProvider::new(vec![
        vec![
            chunk(Fragment::thinking("The user wants the date.")),
            signature("sig-1"),
            chunk(Fragment::text("Let me check. ")),
            finish(vec![time_call("toolu_1")]),
        ],
        vec![
            chunk(Fragment::text("It is the third Sunday of Lent.")),
            finish(vec![]),
        ],
    ]);
    let memory: Arc<dyn ConversationMemory> = Arc::new(WindowMemory::new(500));
    let session = session_with(provider.clone(), memory.clone(), AppConfig::default());

    let events = collect(session.send("What day is it?").await.unwrap()).await;

    // Snapshots grow monotonically
    let mut last_answer = 0;
    for event in &events {
        if let AgentStreamEvent::Fragment { answer_text, .. } = event {
            assert!(answer_text.len() >= last_answer);
            last_answer = answer_text.len();
        }
    }

    assert!(events.iter().any(|e| matches!(
        e,
        AgentStreamEvent::ToolCall { name, .. } if name == "get_current_time"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        AgentStreamEvent::ToolResult { success: true, .. }
    )));

    let outcome = events.iter().find_map(TurnOutcome::from_event).unwrap();
    assert_eq!(outcome.answer, "Let me check. It is the third Sunday of Lent.");
    assert_eq!(
        outcome.thinking,
        format!("{THINKING_OPEN}The user wants the date.{THINKING_CLOSE}")
    );
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.tool_calls_made, 1);
    assert_eq!(outcome.usage.unwrap().total_tokens, 240);

    // The second call replays the signed thinking and the tool result
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].messages[0].content.contains("Anna"));
    assert!(requests[0].thinking.is_some());
    let replayed = requests[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Assistant && !m.tool_calls.is_empty())
        .unwrap();
    assert_eq!(replayed.reasoning.as_ref().unwrap().signature, "sig-1");
    assert!(requests[1].messages.iter().any(|m| m.role == Role::Tool));

    // Nothing is saved until the front-end completes the turn
    assert_eq!(session.history_size().await.unwrap(), 1);
    session.complete_turn("What day is it?", &outcome).await.unwrap();
    let history = session.history().await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].content, "What day is it?");
    assert_eq!(history[2].content, outcome.answer);
}

#[tokio::test]
async fn e2e_history_is_replayed_on_next_turn() {
    let provider = ScriptedProvider::new(vec![
        vec![chunk(Fragment::text("Peace be with you.")), finish(vec![])],
        vec![chunk(Fragment::text("And with your spirit.")), finish(vec![])],
    ]);
    let session = session_with(
        provider.clone(),
        Arc::new(WindowMemory::new(500)),
        AppConfig::default(),
    );

    session.ask("Greet me").await.unwrap();
    session.ask("Again").await.unwrap();

    let second: Vec<String> = provider.requests()[1]
        .messages
        .iter()
        .map(|m| m.content.clone())
        .collect();
    assert!(second.contains(&"Greet me".to_string()));
    assert!(second.contains(&"Peace be with you.".to_string()));
    assert_eq!(second.last().unwrap(), "Again");
    assert_eq!(session.history_size().await.unwrap(), 5);
}

#[tokio::test]
async fn e2e_persisted_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");

    {
        let provider = ScriptedProvider::new(vec![vec![
            chunk(Fragment::text("Ave Maria.")),
            finish(vec![]),
        ]]);
        let memory = Arc::new(FileMemory::open(&path, 500).unwrap());
        let session = session_with(provider, memory, AppConfig::default());
        session.ask("Pray with me").await.unwrap();
    }

    let memory = FileMemory::open(&path, 500).unwrap();
    let history = memory.history().await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["How can I help you?", "Pray with me", "Ave Maria."]);
}

#[tokio::test]
async fn e2e_model_switch_disables_thinking() {
    let provider = ScriptedProvider::new(vec![vec![
        chunk(Fragment::text("Hello.")),
        finish(vec![]),
    ]]);
    let mut session = session_with(
        provider.clone(),
        Arc::new(WindowMemory::new(500)),
        AppConfig::default(),
    );

    session.select_model("Sonnet 3.5:2.0").unwrap();
    session.ask("Hi").await.unwrap();

    let request = &provider.requests()[0];
    assert_eq!(request.model, "claude-3-5-sonnet-20241022");
    assert!(request.thinking.is_none());
}

#[tokio::test]
async fn e2e_stream_interruption_ends_turn_without_saving() {
    let provider = ScriptedProvider::new(vec![vec![
        chunk(Fragment::text("Partial")),
        Err(ProviderError::StreamInterrupted("connection reset".into())),
    ]]);
    let session = session_with(
        provider,
        Arc::new(WindowMemory::new(500)),
        AppConfig::default(),
    );

    let events = collect(session.send("Hello").await.unwrap()).await;
    assert!(matches!(events.last(), Some(AgentStreamEvent::Error { .. })));
    assert!(events.iter().all(|e| TurnOutcome::from_event(e).is_none()));
    assert_eq!(session.history_size().await.unwrap(), 1);
}

#[tokio::test]
async fn e2e_iteration_limit_stops_tool_loop() {
    let mut config = AppConfig::default();
    config.agent.max_iterations = 2;
    let provider = ScriptedProvider::new(vec![
        vec![finish(vec![time_call("t1")])],
        vec![finish(vec![time_call("t2")])],
    ]);
    let session = session_with(provider.clone(), Arc::new(WindowMemory::new(500)), config);

    let outcome = session.ask("Loop forever").await.unwrap();
    assert_eq!(provider.requests().len(), 2);
    assert!(outcome.answer.ends_with(ITERATION_LIMIT_NOTICE));
}
