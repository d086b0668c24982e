//! Fragments — the atoms of a streamed model turn.
//!
//! A provider streams a turn as a sequence of fragments: answer text,
//! tool results echoed by the endpoint, reasoning ("thinking") deltas, and
//! anything else the endpoint invents later. Raw fragments arrive as loosely
//! shaped JSON (`{"type": "text", "text": "..."}`, a list of such objects
//! per token, ...). [`Fragment::decode`] is the single place where that shape
//! is interpreted; everything after it works on the typed enum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FragmentError;

/// One piece of streamed model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Fragment {
    /// Narrative answer text.
    Text(String),

    /// A tool result the endpoint streamed back inline.
    ToolResult(String),

    /// A reasoning delta, further split by sub-kind.
    Reasoning(ReasoningDelta),

    /// A well-formed fragment of a kind this build does not understand.
    Unknown { kind: String, raw: Value },
}

/// The nested part of a reasoning fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ReasoningDelta {
    /// Readable thinking text.
    Text(String),

    /// Opaque signature that closes a thinking block.
    Signature(String),

    /// Thinking the endpoint encrypted. Unreadable, but it must be sent
    /// back verbatim when the turn continues after tool use.
    Redacted { data: String },

    /// Any other sub-kind.
    Other { sub_kind: String },
}

impl Fragment {
    /// Shorthand for a text fragment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Shorthand for a tool-result fragment.
    pub fn tool_result(text: impl Into<String>) -> Self {
        Self::ToolResult(text.into())
    }

    /// Shorthand for a reasoning fragment carrying thinking text.
    pub fn thinking(text: impl Into<String>) -> Self {
        Self::Reasoning(ReasoningDelta::Text(text.into()))
    }

    /// The fragment's kind as it appears on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::ToolResult(_) => "tool_result",
            Self::Reasoning(_) => "reasoning",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Decode one raw fragment.
    ///
    /// The kind is read from `type`, falling back to `kind`. Reasoning
    /// fragments (`reasoning_content` or `reasoning`) carry their payload in
    /// a nested object under the key of the same name. A non-empty kind that
    /// is not recognised decodes to [`Fragment::Unknown`]; a missing kind or
    /// a missing required field is a [`FragmentError`].
    pub fn decode(value: &Value) -> Result<Self, FragmentError> {
        let obj = value.as_object().ok_or(FragmentError::NotAnObject)?;

        let kind = obj
            .get("type")
            .or_else(|| obj.get("kind"))
            .and_then(Value::as_str)
            .ok_or(FragmentError::MissingKind)?;

        match kind {
            "" => Err(FragmentError::EmptyKind),
            "text" => Ok(Self::Text(required_str(obj, kind, "text")?)),
            "tool_result" => Ok(Self::ToolResult(required_str(obj, kind, "text")?)),
            "reasoning_content" | "reasoning" => {
                let key = if kind == "reasoning" {
                    "reasoning"
                } else {
                    "reasoning_content"
                };
                let nested = obj.get(key).and_then(Value::as_object).ok_or_else(|| {
                    FragmentError::MissingField {
                        kind: kind.to_string(),
                        field: key,
                    }
                })?;
                Ok(Self::Reasoning(decode_reasoning(kind, nested)?))
            }
            other => Ok(Self::Unknown {
                kind: other.to_string(),
                raw: value.clone(),
            }),
        }
    }

    /// Decode a raw token that is either one fragment object or an array of
    /// them, yielding one result per element in order.
    pub fn decode_batch(value: &Value) -> Vec<Result<Self, FragmentError>> {
        match value {
            Value::Array(items) => items.iter().map(Self::decode).collect(),
            single => vec![Self::decode(single)],
        }
    }
}

fn decode_reasoning(
    kind: &str,
    nested: &Map<String, Value>,
) -> Result<ReasoningDelta, FragmentError> {
    let sub_kind = nested
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FragmentError::MissingField {
            kind: kind.to_string(),
            field: "type",
        })?;

    match sub_kind {
        "text" => Ok(ReasoningDelta::Text(required_str(nested, kind, "text")?)),
        "signature" => Ok(ReasoningDelta::Signature(required_str(
            nested,
            kind,
            "signature",
        )?)),
        "redacted_thinking" => Ok(ReasoningDelta::Redacted {
            data: required_str(nested, kind, "data")?,
        }),
        other => Ok(ReasoningDelta::Other {
            sub_kind: other.to_string(),
        }),
    }
}

fn required_str(
    obj: &Map<String, Value>,
    kind: &str,
    field: &'static str,
) -> Result<String, FragmentError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FragmentError::MissingField {
            kind: kind.to_string(),
            field,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_text_and_tool_result() {
        assert_eq!(
            Fragment::decode(&json!({"type": "text", "text": "42"})).unwrap(),
            Fragment::text("42")
        );
        assert_eq!(
            Fragment::decode(&json!({"type": "tool_result", "text": "7"})).unwrap(),
            Fragment::tool_result("7")
        );
    }

    #[test]
    fn kind_key_is_accepted_as_alias() {
        let frag = Fragment::decode(&json!({
            "kind": "reasoning",
            "reasoning": {"type": "text", "text": "pondering"}
        }))
        .unwrap();
        assert_eq!(frag, Fragment::thinking("pondering"));
    }

    #[test]
    fn decodes_reasoning_content_shape() {
        let frag = Fragment::decode(&json!({
            "type": "reasoning_content",
            "reasoning_content": {"type": "text", "text": "hmm"},
            "index": 0
        }))
        .unwrap();
        assert_eq!(frag, Fragment::thinking("hmm"));
    }

    #[test]
    fn reasoning_sub_kinds() {
        let sig = Fragment::decode(&json!({
            "type": "reasoning_content",
            "reasoning_content": {"type": "signature", "signature": "abc"}
        }))
        .unwrap();
        assert_eq!(
            sig,
            Fragment::Reasoning(ReasoningDelta::Signature("abc".into()))
        );

        let redacted = Fragment::decode(&json!({
            "type": "reasoning_content",
            "reasoning_content": {"type": "redacted_content", "data": "..."}
        }))
        .unwrap();
        assert_eq!(
            redacted,
            Fragment::Reasoning(ReasoningDelta::Other {
                sub_kind: "redacted_content".into()
            })
        );

        let encrypted = Fragment::decode(&json!({
            "type": "reasoning_content",
            "reasoning_content": {"type": "redacted_thinking", "data": "EmwK"}
        }))
        .unwrap();
        assert_eq!(
            encrypted,
            Fragment::Reasoning(ReasoningDelta::Redacted {
                data: "EmwK".into()
            })
        );
        assert!(
            Fragment::decode(&json!({
                "type": "reasoning_content",
                "reasoning_content": {"type": "redacted_thinking"}
            }))
            .is_err()
        );
    }

    #[test]
    fn unknown_kind_keeps_raw_value() {
        let raw = json!({"type": "citation", "url": "https://example.com"});
        match Fragment::decode(&raw).unwrap() {
            Fragment::Unknown { kind, raw: kept } => {
                assert_eq!(kind, "citation");
                assert_eq!(kept, raw);
            }
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn malformed_fragments_are_errors() {
        assert_eq!(
            Fragment::decode(&json!("just a string")),
            Err(FragmentError::NotAnObject)
        );
        assert_eq!(
            Fragment::decode(&json!({"text": "no kind"})),
            Err(FragmentError::MissingKind)
        );
        assert_eq!(
            Fragment::decode(&json!({"type": 3, "text": "numeric kind"})),
            Err(FragmentError::MissingKind)
        );
        assert_eq!(
            Fragment::decode(&json!({"type": ""})),
            Err(FragmentError::EmptyKind)
        );
        assert!(matches!(
            Fragment::decode(&json!({"type": "text"})),
            Err(FragmentError::MissingField { field: "text", .. })
        ));
        assert!(matches!(
            Fragment::decode(&json!({"type": "reasoning_content"})),
            Err(FragmentError::MissingField { field: "reasoning_content", .. })
        ));
        assert!(matches!(
            Fragment::decode(&json!({"type": "reasoning_content", "reasoning_content": {"text": "x"}})),
            Err(FragmentError::MissingField { field: "type", .. })
        ));
    }

    #[test]
    fn batch_preserves_order_and_errors() {
        let results = Fragment::decode_batch(&json!([
            {"type": "text", "text": "a"},
            {"oops": true},
            {"type": "text", "text": "b"}
        ]));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Ok(Fragment::text("a")));
        assert!(results[1].is_err());
        assert_eq!(results[2], Ok(Fragment::text("b")));

        let single = Fragment::decode_batch(&json!({"type": "text", "text": "solo"}));
        assert_eq!(single, vec![Ok(Fragment::text("solo"))]);
    }

    #[test]
    fn kind_names() {
        assert_eq!(Fragment::text("x").kind(), "text");
        assert_eq!(Fragment::tool_result("x").kind(), "tool_result");
        assert_eq!(Fragment::thinking("x").kind(), "reasoning");
        let unknown = Fragment::Unknown {
            kind: "image".into(),
            raw: Value::Null,
        };
        assert_eq!(unknown.kind(), "image");
    }

    #[test]
    fn serializes_adjacently_tagged() {
        let json = serde_json::to_string(&Fragment::text("hi")).unwrap();
        assert_eq!(json, r#"{"kind":"text","payload":"hi"}"#);
    }
}
