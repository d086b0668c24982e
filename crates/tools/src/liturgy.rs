//! Liturgical calendar and reference documents.
//!
//! Calendar data comes from the Church Calendar API
//! (`calapi.inadiutorium.cz`). The reference documents are static markdown
//! compiled into the binary.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use vicagent_core::error::ToolError;
use vicagent_core::tool::{Tool, ToolResult};

pub const DEFAULT_CALENDAR_URL: &str = "http://calapi.inadiutorium.cz/api/v0/en/calendars/default";

const LITURGY_EXPLANATION: &str = include_str!("../docs/liturgy.md");
const OLD_TESTAMENT_SUMMARY: &str = include_str!("../docs/old_testament.md");
const NEW_TESTAMENT_SUMMARY: &str = include_str!("../docs/new_testament.md");

/// Client for the liturgical calendar API.
#[derive(Clone)]
pub struct LiturgyClient {
    client: reqwest::Client,
    base_url: String,
}

impl LiturgyClient {
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| calendar_error(e.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_CALENDAR_URL.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Every day of a month, as the API's JSON array.
    pub async fn month(&self, year: i32, month: u32) -> Result<Value, ToolError> {
        self.fetch(&format!("{}/{year}/{month}", self.base_url)).await
    }

    /// A single day, as the API's JSON object.
    pub async fn day(&self, year: i32, month: u32, day: u32) -> Result<Value, ToolError> {
        self.fetch(&format!("{}/{year}/{month}/{day}", self.base_url))
            .await
    }

    async fn fetch(&self, url: &str) -> Result<Value, ToolError> {
        debug!(url, "Fetching liturgical calendar");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| calendar_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "Calendar API returned an error");
            return Err(calendar_error(format!("calendar API returned {status}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| calendar_error(format!("invalid calendar JSON: {e}")))
    }
}

fn calendar_error(reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "get_liturgy_for_year_and_month".into(),
        reason,
    }
}

/// One-line summary of a day object, for the system prompt.
///
/// `{"season": "lent", "season_week": 2, "celebrations": [{"title": "...",
/// "colour": "violet"}]}` becomes `"... (violet); lent season, week 2"`.
pub fn describe_day(day: &Value) -> String {
    let celebrations: Vec<String> = day["celebrations"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|c| {
                    let title = c["title"].as_str()?;
                    Some(match c["colour"].as_str() {
                        Some(colour) => format!("{title} ({colour})"),
                        None => title.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut text = if celebrations.is_empty() {
        "no celebration".to_string()
    } else {
        celebrations.join(", ")
    };

    if let Some(season) = day["season"].as_str() {
        text.push_str(&format!("; {season} season"));
        if let Some(week) = day["season_week"].as_u64() {
            text.push_str(&format!(", week {week}"));
        }
    }
    text
}

/// `get_liturgy_for_year_and_month`
pub struct LiturgyMonthTool {
    client: LiturgyClient,
}

impl LiturgyMonthTool {
    pub fn new(client: LiturgyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for LiturgyMonthTool {
    fn name(&self) -> &str {
        "get_liturgy_for_year_and_month"
    }

    fn description(&self) -> &str {
        "Returns the liturgy for a given year and month as JSON string"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "year": { "type": "integer", "description": "Four digit year" },
                "month": { "type": "integer", "description": "Month number, 1-12" }
            },
            "required": ["year", "month"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let year = arguments["year"]
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .ok_or_else(|| ToolError::InvalidArguments("Missing or invalid 'year'".into()))?;
        let month = arguments["month"]
            .as_u64()
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| ToolError::InvalidArguments("'month' must be between 1 and 12".into()))?;

        let days = self.client.month(year, month).await?;
        let json = serde_json::to_string(&days)
            .map_err(|e| calendar_error(format!("serialize: {e}")))?;
        Ok(ToolResult::ok(json).with_data(days))
    }
}

/// A tool that returns a fixed markdown document.
pub struct StaticDocumentTool {
    name: &'static str,
    description: &'static str,
    document: &'static str,
}

impl StaticDocumentTool {
    pub fn liturgy_explanation() -> Self {
        Self {
            name: "get_liturgy_explanation",
            description: "Get a full explanation of the Roman Catholic Liturgy in markdown format\n \
                          Note: Only use this tool for faith related questions",
            document: LITURGY_EXPLANATION,
        }
    }

    pub fn old_testament_summary() -> Self {
        Self {
            name: "get_summary_of_old_testament",
            description: "Get a summary of the Old Testament in markdown format\n \
                          Note: Only use this tool for faith related questions",
            document: OLD_TESTAMENT_SUMMARY,
        }
    }

    pub fn new_testament_summary() -> Self {
        Self {
            name: "get_summary_of_new_testament",
            description: "Get a summary of the New Testament in markdown format\n \
                          Note: Only use this tool for faith related questions",
            document: NEW_TESTAMENT_SUMMARY,
        }
    }
}

#[async_trait]
impl Tool for StaticDocumentTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(self.document))
    }
}
