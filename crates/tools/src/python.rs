//! Python tool — run a snippet with the system interpreter.
//!
//! The snippet runs as `python3 -c <code>` in a scratch directory. Only what
//! it prints comes back, so the description tells the model to print.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use vicagent_core::error::ToolError;
use vicagent_core::tool::{Tool, ToolResult};

pub struct PythonTool {
    interpreter: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl PythonTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            interpreter: "python3".into(),
            workdir: std::env::temp_dir().join("vicagent-python"),
            timeout,
        }
    }

    /// Use another interpreter binary.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "python".into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for PythonTool {
    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        "A Python shell. Use this to execute python code. Input should be valid python code. \
         If you want to see the output of a value, you should print it out with `print(...)`."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source to execute"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let code = arguments["code"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;
        let code = strip_fences(code);

        tokio::fs::create_dir_all(&self.workdir)
            .await
            .map_err(|e| self.failed(format!("workdir: {e}")))?;

        debug!(bytes = code.len(), "Executing python snippet");

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c").arg(code).current_dir(&self.workdir).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "python".into(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| self.failed(format!("{}: {e}", self.interpreter)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(ToolResult::ok(stdout.trim_end()))
        } else {
            // Tracebacks go back to the model so it can fix its code.
            Ok(ToolResult::failed(format!("{stdout}{stderr}").trim_end()))
        }
    }
}

/// Drop a surrounding markdown code fence, which models often add.
fn strip_fences(code: &str) -> &str {
    let trimmed = code.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return code;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // The info string (`python`, `py`, ...) runs to the first newline.
    match rest.split_once('\n') {
        Some((_, body)) => body.trim(),
        None => rest.trim(),
    }
}
