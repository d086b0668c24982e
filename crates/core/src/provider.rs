//! Provider trait — the abstraction over the inference endpoint.
//!
//! A Provider sends a conversation to a model and returns either a complete
//! message or a stream of chunks, each carrying the [`Fragment`]s that
//! arrived since the previous chunk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::fragment::{Fragment, ReasoningDelta};
use crate::message::{Message, MessageToolCall};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Endpoint model id (e.g. "claude-3-7-sonnet-20250219")
    pub model: String,

    /// The conversation messages, system prompt first
    pub messages: Vec<Message>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default)]
    pub stream: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,

    /// Extended thinking; `None` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

fn default_temperature() -> f32 {
    1.0
}

/// Extended-thinking settings forwarded to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    pub budget_tokens: u32,
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,

    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated message
    pub message: Message,

    /// Content fragments in the order the endpoint produced them
    #[serde(default)]
    pub fragments: Vec<Fragment>,

    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Add another request's usage to this running total.
    pub fn accumulate(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Fragments received since the previous chunk, in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<Fragment>,

    /// Completed tool calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// A chunk carrying one fragment.
    pub fn fragment(fragment: Fragment) -> Self {
        Self {
            fragments: vec![fragment],
            ..Self::default()
        }
    }
}

impl From<ProviderResponse> for StreamChunk {
    /// The whole response as one final chunk.
    fn from(response: ProviderResponse) -> Self {
        let fragments = if response.fragments.is_empty() {
            fragments_of(&response.message)
        } else {
            response.fragments
        };
        Self {
            fragments,
            tool_calls: response.message.tool_calls,
            done: true,
            usage: response.usage,
        }
    }
}

/// Fragments equivalent to a complete message, for providers that cannot
/// stream: the reasoning blocks (if any) first, then the text.
pub fn fragments_of(message: &Message) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    if let Some(block) = &message.reasoning {
        fragments.push(Fragment::thinking(block.thinking.clone()));
        fragments.push(Fragment::Reasoning(ReasoningDelta::Signature(
            block.signature.clone(),
        )));
    }
    for data in &message.redacted_thinking {
        fragments.push(Fragment::Reasoning(ReasoningDelta::Redacted {
            data: data.clone(),
        }));
    }
    if !message.content.is_empty() {
        fragments.push(Fragment::text(message.content.clone()));
    }
    fragments
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` or `stream()` without knowing which
/// endpoint sits behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `complete()` and wraps the result as a
    /// single final chunk.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(StreamChunk::from(response))).await;
        Ok(rx)
    }
}
