//! Clock tool.

use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use vicagent_core::error::ToolError;
use vicagent_core::tool::{Tool, ToolResult};

/// Local date and time as RFC 3339, e.g. `2025-03-02T10:15:00+01:00`.
pub fn current_date_time() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Returns the current local date and time in RFC 3339 format"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(current_date_time()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_rfc3339() {
        let now = current_date_time();
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok(), "{now}");
    }

    #[tokio::test]
    async fn tool_returns_parseable_time() {
        let result = CurrentTimeTool
            .execute(serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(chrono::DateTime::parse_from_rfc3339(&result.output).is_ok());
    }
}
