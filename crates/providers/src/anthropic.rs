//! Anthropic Messages API provider.
//!
//! - `x-api-key` header authentication
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Extended thinking, with thinking blocks replayed inside a tool-use turn
//! - Streaming via SSE, decoded into [`Fragment`]s by [`SseDecoder`]

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use vicagent_core::error::ProviderError;
use vicagent_core::fragment::{Fragment, ReasoningDelta};
use vicagent_core::message::{Message, MessageToolCall, ReasoningBlock, Role};
use vicagent_core::provider::*;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 8192;
const STREAM_BUFFER: usize = 64;

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        // Thinking turns can take minutes.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Point at another Messages API endpoint (a gateway, a proxy, a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Split system messages out; Anthropic takes the system prompt as a
    /// top-level field.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    fn to_api_messages(messages: &[&Message]) -> Vec<AnthropicMessage> {
        let mut result = Vec::new();

        for msg in messages {
            match msg.role {
                Role::User => result.push(AnthropicMessage {
                    role: "user".into(),
                    content: AnthropicContent::Text(msg.content.clone()),
                }),
                Role::Assistant
                    if msg.tool_calls.is_empty()
                        && msg.reasoning.is_none()
                        && msg.redacted_thinking.is_empty() =>
                {
                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Text(msg.content.clone()),
                    })
                }
                Role::Assistant => {
                    let mut blocks: Vec<ContentBlock> = Vec::new();
                    if let Some(block) = &msg.reasoning {
                        blocks.push(ContentBlock::Thinking {
                            thinking: block.thinking.clone(),
                            signature: block.signature.clone(),
                        });
                    }
                    for data in &msg.redacted_thinking {
                        blocks.push(ContentBlock::RedactedThinking { data: data.clone() });
                    }
                    if !msg.content.is_empty() {
                        blocks.push(ContentBlock::Text {
                            text: msg.content.clone(),
                        });
                    }
                    for tc in &msg.tool_calls {
                        let input: Value = serde_json::from_str(&tc.arguments)
                            .unwrap_or_else(|_| Value::Object(Default::default()));
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input,
                        });
                    }
                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Blocks(blocks),
                    });
                }
                Role::Tool => {
                    let block = ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    };
                    // Consecutive tool results belong in a single user turn.
                    if let Some(AnthropicMessage {
                        role,
                        content: AnthropicContent::Blocks(blocks),
                    }) = result.last_mut()
                        && role.as_str() == "user"
                        && blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. }))
                    {
                        blocks.push(block);
                    } else {
                        result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(vec![block]),
                        });
                    }
                }
                Role::System => {}
            }
        }

        result
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    /// Build the JSON request body.
    fn build_body(request: &ProviderRequest, stream: bool) -> Value {
        let (system, messages) = Self::extract_system(&request.messages);
        let api_messages = Self::to_api_messages(&messages);

        let mut body = json!({
            "model": request.model,
            "messages": api_messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if stream {
            body["stream"] = json!(true);
        }

        if let Some(sys) = system {
            body["system"] = json!(sys);
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(Self::to_api_tools(&request.tools));
        }

        if !request.stop.is_empty() {
            body["stop_sequences"] = json!(request.stop);
        }

        // Thinking requires the endpoint's default temperature.
        match request.thinking {
            Some(thinking) => {
                body["thinking"] = json!({
                    "type": "enabled",
                    "budget_tokens": thinking.budget_tokens
                });
            }
            None => {
                body["temperature"] = json!(request.temperature);
            }
        }

        body
    }

    async fn post(&self, body: &Value, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 => Ok(response),
            429 => Err(ProviderError::RateLimited {
                retry_after_secs: retry_after(&response).unwrap_or(5),
            }),
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            )),
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Anthropic API error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::build_body(&request, false);
        debug!(provider = "anthropic", model = %request.model, "Sending completion request");

        let response = self.post(&body, false).await?;
        let api_resp: AnthropicResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Ok(response_to_provider_response(api_resp))
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let body = Self::build_body(&request, true);
        debug!(provider = "anthropic", model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for item in decoder.push(&bytes) {
                    let last = !matches!(&item, Ok(chunk) if !chunk.done);
                    if tx.send(item).await.is_err() || last {
                        return;
                    }
                }
            }

            warn!("Anthropic stream ended without message_stop");
            let _ = tx.send(Ok(decoder.finish())).await;
        });

        Ok(rx)
    }
}

/// Incremental decoder for the Messages API event stream.
///
/// Feed raw bytes with [`push`](Self::push); each complete `data:` line is
/// interpreted and turned into zero or one [`StreamChunk`]. The final chunk
/// (`done == true`) carries the completed tool calls and the usage totals.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending_tool: Option<MessageToolCall>,
    tool_calls: Vec<MessageToolCall>,
    input_tokens: u32,
    output_tokens: u32,
    finished: bool,
}

impl SseDecoder {
    /// Feed bytes; returns the chunks completed by them, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamChunk, ProviderError>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.finished {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = self.line(line.trim_end_matches(['\n', '\r'])) {
                out.push(item);
            }
        }

        out
    }

    /// The terminal chunk: completed tool calls and usage.
    pub fn finish(&mut self) -> StreamChunk {
        self.close_tool();
        self.finished = true;
        StreamChunk {
            fragments: Vec::new(),
            tool_calls: std::mem::take(&mut self.tool_calls),
            done: true,
            usage: Some(Usage::new(self.input_tokens, self.output_tokens)),
        }
    }

    fn line(&mut self, line: &str) -> Option<Result<StreamChunk, ProviderError>> {
        // `event:` lines repeat the `type` field of the following data line.
        let data = line.strip_prefix("data:")?.trim();
        if data.is_empty() {
            return None;
        }

        let event: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                return None;
            }
        };

        self.event(&event)
    }

    fn event(&mut self, event: &Value) -> Option<Result<StreamChunk, ProviderError>> {
        match event["type"].as_str().unwrap_or("") {
            "message_start" => {
                if let Some(n) = event["message"]["usage"]["input_tokens"].as_u64() {
                    self.input_tokens = n as u32;
                }
                None
            }
            "content_block_start" => self.block_start(&event["content_block"]),
            "content_block_delta" => self.delta(&event["delta"]),
            "content_block_stop" => {
                self.close_tool();
                None
            }
            "message_delta" => {
                if let Some(n) = event["usage"]["output_tokens"].as_u64() {
                    self.output_tokens = n as u32;
                }
                if let Some(n) = event["usage"]["input_tokens"].as_u64() {
                    self.input_tokens = n as u32;
                }
                None
            }
            "message_stop" => Some(Ok(self.finish())),
            "error" => {
                self.finished = true;
                let message = event["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown stream error");
                Some(Err(ProviderError::StreamInterrupted(message.to_string())))
            }
            _ => None,
        }
    }

    fn block_start(&mut self, block: &Value) -> Option<Result<StreamChunk, ProviderError>> {
        let block_type = block["type"].as_str().unwrap_or("");
        let fragment = match block_type {
            "tool_use" => {
                self.close_tool();
                self.pending_tool = Some(MessageToolCall {
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                });
                return None;
            }
            "text" => match block["text"].as_str() {
                Some(text) if !text.is_empty() => Fragment::text(text),
                _ => return None,
            },
            "thinking" => match block["thinking"].as_str() {
                Some(text) if !text.is_empty() => Fragment::thinking(text),
                _ => return None,
            },
            "redacted_thinking" => Fragment::Reasoning(ReasoningDelta::Redacted {
                data: block["data"].as_str()?.to_string(),
            }),
            t if t.ends_with("tool_result") => Fragment::ToolResult(block_text(&block["content"])),
            "" => return None,
            other => Fragment::Unknown {
                kind: other.to_string(),
                raw: block.clone(),
            },
        };
        Some(Ok(StreamChunk::fragment(fragment)))
    }

    fn delta(&mut self, delta: &Value) -> Option<Result<StreamChunk, ProviderError>> {
        let delta_type = delta["type"].as_str().unwrap_or("");
        let fragment = match delta_type {
            "text_delta" => Fragment::text(delta["text"].as_str()?),
            "thinking_delta" => Fragment::thinking(delta["thinking"].as_str()?),
            "signature_delta" => Fragment::Reasoning(ReasoningDelta::Signature(
                delta["signature"].as_str()?.to_string(),
            )),
            "input_json_delta" => {
                if let (Some(tool), Some(partial)) =
                    (self.pending_tool.as_mut(), delta["partial_json"].as_str())
                {
                    tool.arguments.push_str(partial);
                }
                return None;
            }
            "" => return None,
            other => Fragment::Unknown {
                kind: other.to_string(),
                raw: delta.clone(),
            },
        };
        Some(Ok(StreamChunk::fragment(fragment)))
    }

    fn close_tool(&mut self) {
        if let Some(mut tool) = self.pending_tool.take() {
            if tool.arguments.trim().is_empty() {
                tool.arguments = "{}".into();
            }
            self.tool_calls.push(tool);
        }
    }
}

/// Text of a tool-result block's `content` (a string or a list of blocks).
fn block_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
    let mut text_content = String::new();
    let mut tool_calls = Vec::new();
    let mut fragments = Vec::new();
    let mut reasoning = None;
    let mut redacted = Vec::new();

    for block in resp.content {
        match block {
            ResponseContentBlock::Text { text } => {
                text_content.push_str(&text);
                fragments.push(Fragment::Text(text));
            }
            ResponseContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(MessageToolCall {
                    id,
                    name,
                    arguments: input.to_string(),
                });
            }
            ResponseContentBlock::Thinking {
                thinking,
                signature,
            } => {
                fragments.push(Fragment::thinking(thinking.clone()));
                fragments.push(Fragment::Reasoning(ReasoningDelta::Signature(
                    signature.clone(),
                )));
                reasoning = Some(ReasoningBlock {
                    thinking,
                    signature,
                });
            }
            ResponseContentBlock::RedactedThinking { data } => {
                fragments.push(Fragment::Reasoning(ReasoningDelta::Redacted {
                    data: data.clone(),
                }));
                redacted.push(data);
            }
            ResponseContentBlock::Other => {}
        }
    }

    let mut message = Message::assistant(text_content);
    message.id = resp.id;
    message.tool_calls = tool_calls;
    message.reasoning = reasoning;
    message.redacted_thinking = redacted;

    ProviderResponse {
        message,
        fragments,
        usage: Some(Usage::new(resp.usage.input_tokens, resp.usage.output_tokens)),
        model: resp.model,
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Thinking {
        thinking: String,
        signature: String,
    },
    RedactedThinking {
        data: String,
    },
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },
    RedactedThinking {
        #[serde(default)]
        data: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
