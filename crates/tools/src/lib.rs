//! Built-in tool implementations for VicAgent.
//!
//! Tools give the assistant a way to act mid-turn: run shell commands and
//! Python snippets, make HTTP requests, read the clock, and look up the
//! liturgical calendar and a few reference documents.

pub mod http_request;
pub mod liturgy;
pub mod python;
pub mod shell;
pub mod time;

pub use liturgy::{LiturgyClient, describe_day};
pub use time::current_date_time;

use std::time::Duration;
use vicagent_config::ToolsConfig;
use vicagent_core::error::ToolError;
use vicagent_core::tool::ToolRegistry;

/// Create a registry with every built-in tool.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(shell::ShellTool::new(
        config.shell_allowlist.clone(),
        timeout,
    )));
    registry.register(Box::new(python::PythonTool::new(timeout)));
    registry.register(Box::new(http_request::HttpRequestTool::new(timeout)?));
    registry.register(Box::new(time::CurrentTimeTool));
    registry.register(Box::new(liturgy::LiturgyMonthTool::new(LiturgyClient::new(
        timeout,
    )?)));
    registry.register(Box::new(liturgy::StaticDocumentTool::liturgy_explanation()));
    registry.register(Box::new(liturgy::StaticDocumentTool::old_testament_summary()));
    registry.register(Box::new(liturgy::StaticDocumentTool::new_testament_summary()));

    tracing::debug!(count = registry.len(), "Tool registry ready");
    Ok(registry)
}
