//! Turn accumulator — routes the fragments of one turn into two channels.
//!
//! Every fragment the model streams lands in exactly one place:
//!
//! | fragment                         | goes to          |
//! |----------------------------------|------------------|
//! | `text`, `tool_result`            | `answer_text`    |
//! | `reasoning` with sub-kind `text` | `thinking_text`, wrapped in [`THINKING_OPEN`]/[`THINKING_CLOSE`] |
//! | `reasoning` signature            | kept aside, never shown |
//! | redacted `reasoning`             | data kept aside; shown per [`ReasoningPolicy`] |
//! | other `reasoning` sub-kinds      | dropped or surfaced, per [`ReasoningPolicy`] |
//! | unknown kind                     | a diagnostic line in `answer_text` |
//! | malformed raw fragment           | dropped, logged at `warn` |
//!
//! Both buffers only ever grow. A new turn gets a new accumulator.

use serde_json::Value;
use tracing::{debug, warn};
use vicagent_config::ReasoningPolicy;
use vicagent_core::fragment::{Fragment, ReasoningDelta};
use vicagent_core::message::ReasoningBlock;

pub const THINKING_OPEN: &str = "<i style='color: darkgray;'>";
pub const THINKING_CLOSE: &str = "</i>";

/// Both channels as they stand after the latest fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnView<'a> {
    pub answer_text: &'a str,
    pub thinking_text: &'a str,
}

#[derive(Debug, Default)]
pub struct TurnAccumulator {
    policy: ReasoningPolicy,
    answer_text: String,
    thinking_text: String,

    // Per model call: the unwrapped thinking and its signature, replayed to
    // the endpoint when the call ends in tool use.
    segment_start: usize,
    raw_thinking: String,
    signature: String,
    redacted: Vec<String>,
}

impl TurnAccumulator {
    pub fn new(policy: ReasoningPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Route one fragment and return both channels.
    pub fn process(&mut self, fragment: Fragment) -> TurnView<'_> {
        match fragment {
            Fragment::Text(text) | Fragment::ToolResult(text) => {
                self.answer_text.push_str(&text);
            }
            Fragment::Reasoning(delta) => self.process_reasoning(delta),
            Fragment::Unknown { kind, raw } => {
                self.answer_text
                    .push_str(&format!("Unknown token type: {kind} and item='{raw}'"));
            }
        }
        self.view()
    }

    /// Decode a raw token (one fragment object or an array of them) and
    /// route every well-formed fragment. Malformed ones are dropped.
    pub fn process_raw(&mut self, raw: &Value) -> TurnView<'_> {
        for decoded in Fragment::decode_batch(raw) {
            match decoded {
                Ok(fragment) => {
                    self.process(fragment);
                }
                Err(e) => warn!(error = %e, fragment = %raw, "Dropping malformed fragment"),
            }
        }
        self.view()
    }

    fn process_reasoning(&mut self, delta: ReasoningDelta) {
        match delta {
            ReasoningDelta::Text(text) => {
                self.raw_thinking.push_str(&text);
                self.push_thinking(&text);
            }
            ReasoningDelta::Signature(signature) => self.signature.push_str(&signature),
            ReasoningDelta::Redacted { data } => {
                self.redacted.push(data);
                self.unhandled_reasoning("redacted_thinking");
            }
            ReasoningDelta::Other { sub_kind } => self.unhandled_reasoning(&sub_kind),
        }
    }

    fn unhandled_reasoning(&mut self, sub_kind: &str) {
        match self.policy {
            ReasoningPolicy::Drop => {
                debug!(sub_kind = %sub_kind, "Dropping reasoning fragment");
            }
            ReasoningPolicy::Surface => {
                self.push_thinking(&format!("[unhandled reasoning sub-kind: {sub_kind}]"));
            }
        }
    }

    /// The thinking channel is rendered as HTML, so the payload is escaped
    /// before it is wrapped.
    fn push_thinking(&mut self, text: &str) {
        self.thinking_text.push_str(THINKING_OPEN);
        escape_html_into(&mut self.thinking_text, text);
        self.thinking_text.push_str(THINKING_CLOSE);
    }

    pub fn view(&self) -> TurnView<'_> {
        TurnView {
            answer_text: &self.answer_text,
            thinking_text: &self.thinking_text,
        }
    }

    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    pub fn thinking_text(&self) -> &str {
        &self.thinking_text
    }

    /// The signature of the current segment's thinking block, if one closed.
    pub fn signature(&self) -> Option<&str> {
        (!self.signature.is_empty()).then_some(self.signature.as_str())
    }

    /// Mark the start of a new model call within the turn.
    pub fn start_segment(&mut self) {
        self.segment_start = self.answer_text.len();
        self.raw_thinking.clear();
        self.signature.clear();
        self.redacted.clear();
    }

    /// Answer text produced since the last [`start_segment`](Self::start_segment).
    pub fn segment_answer(&self) -> &str {
        &self.answer_text[self.segment_start..]
    }

    /// The current segment's signed thinking block.
    ///
    /// `None` unless both the text and the signature arrived; an unsigned
    /// block cannot be sent back to the endpoint.
    pub fn reasoning_block(&self) -> Option<ReasoningBlock> {
        let signature = self.signature()?;
        Some(ReasoningBlock {
            thinking: self.raw_thinking.clone(),
            signature: signature.to_string(),
        })
    }

    /// Encrypted thinking blocks of the current segment, in arrival order.
    pub fn redacted_blocks(&self) -> &[String] {
        &self.redacted
    }

    /// Consume the accumulator, yielding `(answer_text, thinking_text)`.
    pub fn into_parts(self) -> (String, String) {
        (self.answer_text, self.thinking_text)
    }
}

fn escape_html_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
