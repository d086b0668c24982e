//! Inference providers for VicAgent.
//!
//! All providers implement the `vicagent_core::Provider` trait.

pub mod anthropic;

pub use anthropic::{AnthropicProvider, SseDecoder};

use std::sync::Arc;
use vicagent_config::AppConfig;
use vicagent_core::error::ProviderError;
use vicagent_core::provider::Provider;

/// Build the configured provider.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set api_key in ~/.vicagent/config.toml or VICAGENT_API_KEY / ANTHROPIC_API_KEY"
                .into(),
        )
    })?;

    let provider = AnthropicProvider::new(api_key)?.with_base_url(&config.base_url);
    tracing::debug!(base_url = %provider.base_url(), "Built Anthropic provider");
    Ok(Arc::new(provider))
}
