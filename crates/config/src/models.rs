//! The model catalogue: display options offered to the user and the
//! endpoint ids they resolve to.

use serde::Serialize;

use crate::ConfigError;

/// One selectable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelOption {
    /// What the user picks, e.g. "Sonnet 3.7:1.0"
    pub label: &'static str,
    /// Native Anthropic Messages API id
    pub anthropic_id: &'static str,
    /// Cross-region Bedrock inference profile id
    pub bedrock_id: &'static str,
    /// Whether extended thinking may be requested
    pub supports_thinking: bool,
}

pub const MODEL_OPTIONS: [ModelOption; 3] = [
    ModelOption {
        label: "Sonnet 3.7:1.0",
        anthropic_id: "claude-3-7-sonnet-20250219",
        bedrock_id: "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
        supports_thinking: true,
    },
    ModelOption {
        label: "Sonnet 3.5:2.0",
        anthropic_id: "claude-3-5-sonnet-20241022",
        bedrock_id: "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
        supports_thinking: false,
    },
    ModelOption {
        label: "Sonnet 3.5:1.0",
        anthropic_id: "claude-3-5-sonnet-20240620",
        bedrock_id: "us.anthropic.claude-3-5-sonnet-20240620-v1:0",
        supports_thinking: false,
    },
];

impl ModelOption {
    /// Look up an option by its display label.
    pub fn find(label: &str) -> Result<Self, ConfigError> {
        MODEL_OPTIONS
            .iter()
            .find(|m| m.label == label.trim())
            .copied()
            .ok_or_else(|| ConfigError::UnknownModel(label.to_string()))
    }

    /// The option used when nothing is configured.
    pub fn default_option() -> Self {
        MODEL_OPTIONS[0]
    }

    /// All display labels, in catalogue order.
    pub fn labels() -> Vec<&'static str> {
        MODEL_OPTIONS.iter().map(|m| m.label).collect()
    }

    /// The id to send to the endpoint at `base_url`.
    pub fn provider_model_id(&self, base_url: &str) -> &'static str {
        if base_url.contains("bedrock") {
            self.bedrock_id
        } else {
            self.anthropic_id
        }
    }
}

impl std::fmt::Display for ModelOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}
