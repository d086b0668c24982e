//! Configuration loading and validation for VicAgent.
//!
//! Loads configuration from `~/.vicagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod models;

pub use models::{MODEL_OPTIONS, ModelOption};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.vicagent/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Messages API endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Display label from the model catalogue
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Stream responses fragment by fragment
    #[serde(default = "default_true")]
    pub streaming: bool,

    #[serde(default)]
    pub thinking: ThinkingSettings,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn default_model() -> String {
    ModelOption::default_option().label.into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("streaming", &self.streaming)
            .field("thinking", &self.thinking)
            .field("agent", &self.agent)
            .field("memory", &self.memory)
            .field("tools", &self.tools)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Extended thinking. Ignored for models that do not support it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: u32,
}

fn default_budget_tokens() -> u32 {
    1024
}

impl Default for ThinkingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            budget_tokens: default_budget_tokens(),
        }
    }
}

/// How reasoning fragments with a sub-kind other than text are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningPolicy {
    /// Drop them (logged at debug).
    #[default]
    Drop,
    /// Show a placeholder in the thinking trace.
    Surface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model round-trips allowed per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Name the persona addresses the user by
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub reasoning_policy: ReasoningPolicy,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_username() -> String {
    "Guest".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            username: default_username(),
            reasoning_policy: ReasoningPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of messages replayed into each request
    #[serde(default = "default_window")]
    pub window: usize,

    /// Keep history across restarts in a JSONL file
    #[serde(default)]
    pub persist: bool,

    /// Overrides `~/.vicagent/history.jsonl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_window() -> usize {
    500
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            persist: false,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Commands the shell tool may run. Empty = any.
    #[serde(default)]
    pub shell_allowlist: Vec<String>,

    /// Timeout for shell, python and http tools
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_timeout() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_allowlist: Vec::new(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.vicagent/config.toml).
    ///
    /// Environment overrides:
    /// - `VICAGENT_API_KEY`, then `ANTHROPIC_API_KEY` (when no key is configured)
    /// - `VICAGENT_MODEL`
    /// - `VICAGENT_USERNAME`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("VICAGENT_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY"));
        }
        if let Some(model) = lookup("VICAGENT_MODEL") {
            self.model = model;
        }
        if let Some(username) = lookup("VICAGENT_USERNAME")
            && !username.trim().is_empty()
        {
            self.agent.username = username;
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs_home().join(".vicagent")
    }

    /// Where persisted history lives.
    pub fn history_path(&self) -> PathBuf {
        self.memory
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history.jsonl"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }

        if self.thinking.enabled
            && (self.thinking.budget_tokens < 1024 || self.thinking.budget_tokens >= self.max_tokens)
        {
            return Err(ConfigError::ValidationError(format!(
                "thinking.budget_tokens must be >= 1024 and < max_tokens ({})",
                self.max_tokens
            )));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }

        if self.memory.window == 0 {
            return Err(ConfigError::ValidationError("memory.window must be > 0".into()));
        }

        ModelOption::find(&self.model)?;
        Ok(())
    }

    /// The configured model option.
    pub fn model_option(&self) -> Result<ModelOption, ConfigError> {
        ModelOption::find(&self.model)
    }

    /// Thinking budget to request for `option`, if any.
    pub fn thinking_budget(&self, option: &ModelOption) -> Option<u32> {
        (self.thinking.enabled && option.supports_thinking).then_some(self.thinking.budget_tokens)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            streaming: true,
            thinking: ThinkingSettings::default(),
            agent: AgentConfig::default(),
            memory: MemoryConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown model option '{0}'")]
    UnknownModel(String),
}
