//! The agent reasoning loop.
//!
//! One call to [`AgentLoop::run_stream`] is one visible turn: the model is
//! called, its fragments are routed through a [`TurnAccumulator`], any tool
//! calls it asks for are executed, and the model is called again with the
//! results until it answers without tools or the iteration limit is hit.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vicagent_config::ReasoningPolicy;
use vicagent_core::error::Error;
use vicagent_core::fragment::Fragment;
use vicagent_core::message::{Message, MessageToolCall};
use vicagent_core::provider::{Provider, ProviderRequest, StreamChunk, ThinkingConfig, Usage};
use vicagent_core::tool::{ToolCall, ToolRegistry};

use crate::accumulator::TurnAccumulator;
use crate::stream_event::AgentStreamEvent;

/// Appended to the answer when the model keeps calling tools.
pub const ITERATION_LIMIT_NOTICE: &str = "Agent stopped due to iteration limit.";

/// The finished turn, as collected by [`AgentLoop::run`].
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub answer: String,
    pub thinking: String,
    pub iterations: u32,
    pub tool_calls_made: usize,
    pub usage: Option<Usage>,
}

impl TurnOutcome {
    /// The outcome carried by a `Done` event.
    pub fn from_event(event: &AgentStreamEvent) -> Option<Self> {
        match event {
            AgentStreamEvent::Done {
                answer,
                thinking,
                iterations,
                tool_calls_made,
                usage,
            } => Some(Self {
                answer: answer.clone(),
                thinking: thinking.clone(),
                iterations: *iterations,
                tool_calls_made: *tool_calls_made,
                usage: *usage,
            }),
            _ => None,
        }
    }
}

/// Orchestrates provider calls and tool execution for one model option.
#[derive(Clone)]
pub struct AgentLoop {
    provider: Arc<dyn Provider>,

    /// Endpoint model id
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    thinking: Option<ThinkingConfig>,

    /// When false, each model call is a single `complete` request
    streaming: bool,

    tools: Arc<ToolRegistry>,

    /// Rendered system prompt
    system_prompt: String,

    /// Maximum model calls per turn
    max_iterations: u32,

    reasoning_policy: ReasoningPolicy,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 1.0,
            max_tokens: None,
            thinking: None,
            streaming: true,
            tools,
            system_prompt: system_prompt.into(),
            max_iterations: 25,
            reasoning_policy: ReasoningPolicy::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Request extended thinking with this budget; `None` disables it.
    pub fn with_thinking(mut self, budget_tokens: Option<u32>) -> Self {
        self.thinking = budget_tokens.map(|budget_tokens| ThinkingConfig { budget_tokens });
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_reasoning_policy(mut self, policy: ReasoningPolicy) -> Self {
        self.reasoning_policy = policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn thinking_enabled(&self) -> bool {
        self.thinking.is_some()
    }

    /// Run one turn, streaming events as they happen.
    ///
    /// `history` is the windowed memory, oldest first. The channel closes
    /// after a `Done` or `Error` event.
    pub fn run_stream(&self, input: &str, history: Vec<Message>) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel::<AgentStreamEvent>(128);
        let agent = self.clone();
        let input = input.to_string();

        tokio::spawn(async move {
            agent.drive(input, history, tx).await;
        });

        rx
    }

    async fn drive(self, input: String, history: Vec<Message>, tx: mpsc::Sender<AgentStreamEvent>) {
        info!(model = %self.model, history = history.len(), "Starting turn");

        let mut conversation = Vec::with_capacity(history.len() + 2);
        conversation.push(Message::system(&self.system_prompt));
        conversation.extend(history);
        conversation.push(Message::user(&input));

        let tool_definitions = self.tools.definitions();
        let mut acc = TurnAccumulator::new(self.reasoning_policy);
        let mut usage: Option<Usage> = None;
        let mut tool_calls_made = 0usize;
        let mut iterations = 0u32;

        loop {
            if iterations >= self.max_iterations {
                warn!(iterations, "Max tool iterations reached, stopping turn");
                let fragment = Fragment::text(ITERATION_LIMIT_NOTICE);
                let view = acc.process(fragment.clone());
                let _ = tx
                    .send(AgentStreamEvent::Fragment {
                        answer_text: view.answer_text.to_string(),
                        thinking_text: view.thinking_text.to_string(),
                        fragment,
                    })
                    .await;
                break;
            }
            iterations += 1;
            debug!(iteration = iterations, "Agent loop iteration");

            acc.start_segment();
            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                stream: self.streaming,
                stop: vec![],
                thinking: self.thinking,
            };

            let opened = if self.streaming {
                self.provider.stream(request).await
            } else {
                self.provider.complete(request).await.map(|response| {
                    let (chunk_tx, chunk_rx) = mpsc::channel(1);
                    let _ = chunk_tx.try_send(Ok(StreamChunk::from(response)));
                    chunk_rx
                })
            };
            let mut stream_rx = match opened {
                Ok(rx) => rx,
                Err(e) => {
                    let _ = tx
                        .send(AgentStreamEvent::Error {
                            message: format!("Provider error: {e}"),
                        })
                        .await;
                    return;
                }
            };

            let mut pending_calls: Vec<MessageToolCall> = Vec::new();

            while let Some(chunk_result) = stream_rx.recv().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(error = %e, "Stream failed mid-turn");
                        let _ = tx
                            .send(AgentStreamEvent::Error {
                                message: format!("Stream error: {e}"),
                            })
                            .await;
                        return;
                    }
                };

                for fragment in chunk.fragments {
                    let view = acc.process(fragment.clone());
                    let event = AgentStreamEvent::Fragment {
                        answer_text: view.answer_text.to_string(),
                        thinking_text: view.thinking_text.to_string(),
                        fragment,
                    };
                    if tx.send(event).await.is_err() {
                        debug!("Event receiver dropped, abandoning turn");
                        return;
                    }
                }

                for tc in chunk.tool_calls {
                    if let Some(existing) = pending_calls.iter_mut().find(|t| t.id == tc.id) {
                        existing.arguments.push_str(&tc.arguments);
                    } else {
                        pending_calls.push(tc);
                    }
                }

                if let Some(chunk_usage) = chunk.usage {
                    usage.get_or_insert_with(Usage::default).accumulate(&chunk_usage);
                }
            }

            if pending_calls.is_empty() {
                break;
            }

            // The assistant's tool-use message, with its thinking block first.
            let mut assistant_msg = Message::assistant(acc.segment_answer());
            assistant_msg.tool_calls = pending_calls.clone();
            assistant_msg.reasoning = acc.reasoning_block();
            assistant_msg.redacted_thinking = acc.redacted_blocks().to_vec();
            conversation.push(assistant_msg);

            for tc in &pending_calls {
                tool_calls_made += 1;
                let arguments: serde_json::Value =
                    serde_json::from_str(&tc.arguments).unwrap_or_default();

                let _ = tx
                    .send(AgentStreamEvent::ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        input: arguments.clone(),
                    })
                    .await;

                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                let start = std::time::Instant::now();
                let (output, success) = match self.tools.execute(&call).await {
                    Ok(result) => (result.output, result.success),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        (format!("Error: {e}"), false)
                    }
                };
                debug!(
                    tool = %tc.name,
                    success,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool finished"
                );

                let _ = tx
                    .send(AgentStreamEvent::ToolResult {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        output: output.clone(),
                        success,
                    })
                    .await;

                conversation.push(Message::tool_result(&tc.id, output));
            }
        }

        let (answer, thinking) = acc.into_parts();
        info!(
            iterations,
            tool_calls = tool_calls_made,
            answer_len = answer.len(),
            "Turn complete"
        );
        let _ = tx
            .send(AgentStreamEvent::Done {
                answer,
                thinking,
                iterations,
                tool_calls_made,
                usage,
            })
            .await;
    }

    /// Run one turn to completion.
    pub async fn run(&self, input: &str, history: Vec<Message>) -> Result<TurnOutcome, Error> {
        let mut rx = self.run_stream(input, history);
        while let Some(event) = rx.recv().await {
            if let AgentStreamEvent::Error { message } = event {
                return Err(Error::Internal(message));
            }
            if let Some(outcome) = TurnOutcome::from_event(&event) {
                return Ok(outcome);
            }
        }
        Err(Error::Internal("turn ended without a result".into()))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use async_trait::async_trait;
    use vicagent_core::error::{ProviderError, ToolError};
    use vicagent_core::fragment::ReasoningDelta;
    use vicagent_core::message::Role;
    use vicagent_core::tool::{Tool, ToolResult};

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> &str {
            "add"
        }
        fn description(&self) -> &str {
            "Adds a and b"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, args: serde_json::Value) -> Result<ToolResult, ToolError> {
            let a = args["a"].as_i64().unwrap_or(0);
            let b = args["b"].as_i64().unwrap_or(0);
            Ok(ToolResult::ok((a + b).to_string()))
        }
    }

    fn tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(AddTool));
        Arc::new(registry)
    }

    fn agent(provider: Arc<ScriptedProvider>) -> AgentLoop {
        AgentLoop::new(provider, "claude-test", tools(), "You are VIC.")
    }

    async fn collect(mut rx: mpsc::Receiver<AgentStreamEvent>) -> Vec<AgentStreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn streams_snapshots_then_done() {
        let provider = Arc::new(ScriptedProvider::new(vec![vec![
            Ok(StreamChunk::fragment(Fragment::thinking("pondering"))),
            Ok(StreamChunk::fragment(Fragment::text("4"))),
            Ok(StreamChunk::fragment(Fragment::text("2"))),
            Ok(done_chunk()),
        ]]));
        let events = collect(agent(provider.clone()).run_stream("Meaning?", vec![])).await;

        let snapshots: Vec<(String, String)> = events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::Fragment {
                    answer_text,
                    thinking_text,
                    ..
                } => Some((answer_text.clone(), thinking_text.clone())),
                _ => None,
            })
            .collect();
        let thinking = "<i style='color: darkgray;'>pondering</i>".to_string();
        assert_eq!(
            snapshots,
            vec![
                (String::new(), thinking.clone()),
                ("4".into(), thinking.clone()),
                ("42".into(), thinking.clone()),
            ]
        );

        match events.last().unwrap() {
            AgentStreamEvent::Done {
                answer,
                iterations,
                tool_calls_made,
                usage,
                ..
            } => {
                assert_eq!(answer, "42");
                assert_eq!(*iterations, 1);
                assert_eq!(*tool_calls_made, 0);
                assert_eq!(usage.unwrap().total_tokens, 15);
            }
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_has_system_history_and_input() {
        let provider = Arc::new(ScriptedProvider::new(vec![vec![Ok(done_chunk())]]));
        let history = vec![Message::assistant("How can I help you?")];
        agent(provider.clone())
            .with_thinking(Some(1024))
            .with_max_tokens(8192)
            .run("Hello", history)
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        let request = &requests[0];
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::Assistant, Role::User]);
        assert_eq!(request.messages[0].content, "You are VIC.");
        assert_eq!(request.messages[2].content, "Hello");
        assert_eq!(request.thinking.unwrap().budget_tokens, 1024);
        assert_eq!(request.max_tokens, Some(8192));
        assert!(request.stream);
        assert_eq!(request.tools.len(), 1);
    }

    #[tokio::test]
    async fn executes_tools_and_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            vec![
                Ok(StreamChunk::fragment(Fragment::thinking("need math"))),
                Ok(StreamChunk::fragment(Fragment::Reasoning(
                    ReasoningDelta::Signature("sig".into()),
                ))),
                Ok(StreamChunk::fragment(Fragment::text("Let me add. "))),
                Ok(calls_chunk(vec![tool_call(
                    "toolu_1",
                    "add",
                    serde_json::json!({"a": 3, "b": 4}),
                )])),
            ],
            vec![
                Ok(StreamChunk::fragment(Fragment::text("It is 7."))),
                Ok(done_chunk()),
            ],
        ]));

        let events = collect(agent(provider.clone()).run_stream("3+4?", vec![])).await;

        let tool_events: Vec<&AgentStreamEvent> = events
            .iter()
            .filter(|e| matches!(e, AgentStreamEvent::ToolCall { .. } | AgentStreamEvent::ToolResult { .. }))
            .collect();
        assert_eq!(tool_events.len(), 2);
        match tool_events[1] {
            AgentStreamEvent::ToolResult { output, success, name, .. } => {
                assert_eq!(output, "7");
                assert!(success);
                assert_eq!(name, "add");
            }
            other => panic!("expected tool result, got {other:?}"),
        }

        match events.last().unwrap() {
            AgentStreamEvent::Done {
                answer,
                iterations,
                tool_calls_made,
                usage,
                ..
            } => {
                assert_eq!(answer, "Let me add. It is 7.");
                assert_eq!(*iterations, 2);
                assert_eq!(*tool_calls_made, 1);
                assert_eq!(usage.unwrap().total_tokens, 30);
            }
            other => panic!("expected done, got {other:?}"),
        }

        // Second request replays the signed thinking block and the tool result.
        let requests = provider.requests.lock().unwrap();
        let second = &requests[1].messages;
        let assistant = &second[second.len() - 2];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content, "Let me add. ");
        assert_eq!(assistant.tool_calls[0].name, "add");
        let block = assistant.reasoning.as_ref().unwrap();
        assert_eq!(block.thinking, "need math");
        assert_eq!(block.signature, "sig");
        let result = second.last().unwrap();
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("toolu_1"));
        assert_eq!(result.content, "7");
    }

    #[tokio::test]
    async fn replays_redacted_thinking_before_tool_use() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            vec![
                Ok(StreamChunk::fragment(Fragment::Reasoning(
                    ReasoningDelta::Redacted {
                        data: "EmwKAhgB".into(),
                    },
                ))),
                Ok(calls_chunk(vec![tool_call(
                    "toolu_1",
                    "add",
                    serde_json::json!({"a": 1, "b": 1}),
                )])),
            ],
            vec![
                Ok(StreamChunk::fragment(Fragment::text("It is 2."))),
                Ok(done_chunk()),
            ],
        ]));

        let agent = agent(provider.clone()).with_thinking(Some(1024));
        assert!(agent.thinking_enabled());
        let events = collect(agent.run_stream("1+1?", vec![])).await;
        assert!(matches!(events.last(), Some(AgentStreamEvent::Done { .. })));

        let requests = provider.requests.lock().unwrap();
        let second = &requests[1].messages;
        let assistant = &second[second.len() - 2];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.tool_calls.len(), 1);
        assert!(assistant.reasoning.is_none());
        assert_eq!(assistant.redacted_thinking, ["EmwKAhgB".to_string()]);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            vec![Ok(calls_chunk(vec![tool_call("t1", "teleport", serde_json::json!({}))]))],
            vec![Ok(StreamChunk::fragment(Fragment::text("Sorry."))), Ok(done_chunk())],
        ]));
        let outcome = agent(provider.clone()).run("Go", vec![]).await.unwrap();
        assert_eq!(outcome.answer, "Sorry.");

        let requests = provider.requests.lock().unwrap();
        let result = requests[1].messages.last().unwrap();
        assert!(result.content.starts_with("Error: "), "{}", result.content);
    }

    #[tokio::test]
    async fn iteration_limit_stops_turn() {
        let looping = || -> Vec<Result<StreamChunk, ProviderError>> {
            vec![Ok(calls_chunk(vec![tool_call(
                "t",
                "add",
                serde_json::json!({"a": 1, "b": 1}),
            )]))]
        };
        let provider = Arc::new(ScriptedProvider::new(vec![looping(), looping()]));
        let outcome = agent(provider.clone())
            .with_max_iterations(2)
            .run("Loop", vec![])
            .await
            .unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.tool_calls_made, 2);
        assert_eq!(outcome.answer, ITERATION_LIMIT_NOTICE);
    }

    struct CompleteOnly;

    #[async_trait]
    impl Provider for CompleteOnly {
        fn name(&self) -> &str {
            "complete-only"
        }
        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<vicagent_core::provider::ProviderResponse, ProviderError> {
            assert!(!request.stream);
            Ok(vicagent_core::provider::ProviderResponse {
                message: Message::assistant("Pax tecum."),
                fragments: vec![],
                usage: None,
                model: "claude-test".into(),
            })
        }
        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
            panic!("stream must not be called when streaming is off");
        }
    }

    #[tokio::test]
    async fn non_streaming_uses_complete() {
        let agent = AgentLoop::new(Arc::new(CompleteOnly), "claude-test", tools(), "sys")
            .with_streaming(false);
        let outcome = agent.run("Hi", vec![]).await.unwrap();
        assert_eq!(outcome.answer, "Pax tecum.");
        assert!(outcome.usage.is_none());
    }

    #[tokio::test]
    async fn stream_failure_ends_turn_with_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![vec![
            Ok(StreamChunk::fragment(Fragment::text("partial"))),
            Err(ProviderError::StreamInterrupted("connection reset".into())),
        ]]));
        let events = collect(agent(provider).run_stream("Hi", vec![])).await;
        match events.last().unwrap() {
            AgentStreamEvent::Error { message } => assert!(message.contains("connection reset")),
            other => panic!("expected error, got {other:?}"),
        }
        assert!(!events.iter().any(|e| matches!(e, AgentStreamEvent::Done { .. })));
    }

    #[tokio::test]
    async fn run_surfaces_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![vec![Err(
            ProviderError::StreamInterrupted("gone".into()),
        )]]));
        let err = agent(provider).run("Hi", vec![]).await.unwrap_err();
        assert!(err.to_string().contains("gone"));
    }
}
