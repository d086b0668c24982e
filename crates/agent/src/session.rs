//! One user's session: the selected model, the memory, and the agent.
//!
//! The session is created once per front-end session. Memory is written
//! only by [`Session::complete_turn`]; the model only changes through
//! [`Session::select_model`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use vicagent_config::{AppConfig, ConfigError, ModelOption};
use vicagent_core::error::{Error, MemoryError};
use vicagent_core::memory::ConversationMemory;
use vicagent_core::message::Message;
use vicagent_core::provider::Provider;
use vicagent_core::tool::ToolRegistry;
use vicagent_memory::file::FileMemory;
use vicagent_memory::window::WindowMemory;
use vicagent_tools::LiturgyClient;

use crate::loop_runner::{AgentLoop, TurnOutcome};
use crate::prompt::{SystemPrompt, liturgy_for_today};
use crate::stream_event::AgentStreamEvent;

/// The memory the config asks for: JSONL-backed when `persist` is set.
pub fn build_memory(config: &AppConfig) -> Result<Arc<dyn ConversationMemory>, MemoryError> {
    if config.memory.persist {
        let path = config.history_path();
        info!(path = %path.display(), "Using persisted history");
        Ok(Arc::new(FileMemory::open(path, config.memory.window)?))
    } else {
        Ok(Arc::new(WindowMemory::new(config.memory.window)))
    }
}

pub struct Session {
    config: AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    memory: Arc<dyn ConversationMemory>,
    option: ModelOption,
    agent: AgentLoop,
}

impl Session {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<dyn ConversationMemory>,
        prompt: &SystemPrompt,
    ) -> Result<Self, ConfigError> {
        let option = config.model_option()?;
        let system_prompt = prompt.render();
        let agent = build_agent(&config, &provider, &tools, &system_prompt, option);
        Ok(Self {
            config,
            provider,
            tools,
            system_prompt,
            memory,
            option,
            agent,
        })
    }

    /// Build everything from configuration: provider, tools, memory, and a
    /// system prompt with today's liturgy.
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let provider = vicagent_providers::build_from_config(&config)?;
        let tools = Arc::new(vicagent_tools::default_registry(&config.tools)?);
        let memory = build_memory(&config)?;

        let calendar = LiturgyClient::new(Duration::from_secs(config.tools.timeout_secs))?;
        let prompt = SystemPrompt::new(config.agent.username.clone())
            .with_liturgy(liturgy_for_today(&calendar).await);

        Self::new(config, provider, tools, memory, &prompt).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    pub fn model(&self) -> ModelOption {
        self.option
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Switch to another model option and rebuild the agent.
    pub fn select_model(&mut self, label: &str) -> Result<ModelOption, ConfigError> {
        let option = ModelOption::find(label)?;
        self.agent = build_agent(
            &self.config,
            &self.provider,
            &self.tools,
            &self.system_prompt,
            option,
        );
        self.option = option;
        info!(model = %option, thinking = self.agent.thinking_enabled(), "Model applied");
        Ok(option)
    }

    /// Number of stored messages, greeting included.
    pub async fn history_size(&self) -> Result<usize, MemoryError> {
        self.memory.len().await
    }

    /// The windowed history replayed into requests.
    pub async fn history(&self) -> Result<Vec<Message>, MemoryError> {
        self.memory.history().await
    }

    /// Start a turn. The caller feeds the final `Done` back through
    /// [`complete_turn`](Self::complete_turn).
    pub async fn send(&self, input: &str) -> Result<mpsc::Receiver<AgentStreamEvent>, MemoryError> {
        let history = self.memory.history().await?;
        Ok(self.agent.run_stream(input, history))
    }

    /// Persist a finished turn: the user's input and the final answer.
    pub async fn complete_turn(&self, input: &str, outcome: &TurnOutcome) -> Result<(), MemoryError> {
        self.memory.save_turn(input, &outcome.answer).await
    }

    /// Run a whole turn and persist it.
    pub async fn ask(&self, input: &str) -> Result<TurnOutcome, Error> {
        let history = self.memory.history().await?;
        let outcome = self.agent.run(input, history).await?;
        self.complete_turn(input, &outcome).await?;
        Ok(outcome)
    }
}

fn build_agent(
    config: &AppConfig,
    provider: &Arc<dyn Provider>,
    tools: &Arc<ToolRegistry>,
    system_prompt: &str,
    option: ModelOption,
) -> AgentLoop {
    AgentLoop::new(
        provider.clone(),
        option.provider_model_id(&config.base_url),
        tools.clone(),
        system_prompt,
    )
    .with_temperature(config.temperature)
    .with_max_tokens(config.max_tokens)
    .with_thinking(config.thinking_budget(&option))
    .with_streaming(config.streaming)
    .with_max_iterations(config.agent.max_iterations)
    .with_reasoning_policy(config.agent.reasoning_policy)
}
