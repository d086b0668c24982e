//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps what happens during a turn into events the
//! console and the gateway can render directly or forward over SSE.

use serde::{Deserialize, Serialize};
use vicagent_core::fragment::Fragment;
use vicagent_core::provider::Usage;

/// Events emitted by the agent during streaming execution.
///
/// - `fragment`    — a fragment arrived; carries both channels so far
/// - `tool_call`   — the agent is invoking a tool
/// - `tool_result` — tool execution completed
/// - `done`        — the turn is complete
/// - `error`       — the turn failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    Fragment {
        answer_text: String,
        thinking_text: String,
        fragment: Fragment,
    },

    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// Final channels and metadata.
    Done {
        answer: String,
        thinking: String,
        iterations: u32,
        tool_calls_made: usize,
        usage: Option<Usage>,
    },

    Error { message: String },
}

impl AgentStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Fragment { .. } => "fragment",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
