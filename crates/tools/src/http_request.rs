//! HTTP request tool — lets the model fetch or post to a URL.

use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;
use tracing::debug;
use vicagent_core::error::ToolError;
use vicagent_core::tool::{Tool, ToolResult};

/// Response bodies longer than this are cut before going back to the model.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub struct HttpRequestTool {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpRequestTool {
    pub fn new(default_timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("vicagent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http_request".into(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            default_timeout,
        })
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: "http_request".into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to a URL. Supports GET, POST, PUT, PATCH, and DELETE methods. \
         Returns the response status code and body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to send the request to"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (GET, POST, PUT, PATCH, DELETE). Defaults to GET.",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"],
                    "default": "GET"
                },
                "headers": {
                    "type": "object",
                    "description": "Optional HTTP headers as key-value pairs",
                    "additionalProperties": { "type": "string" }
                },
                "body": {
                    "type": "string",
                    "description": "Optional request body (for POST, PUT, PATCH)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Request timeout in seconds"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        let method = arguments["method"]
            .as_str()
            .unwrap_or("GET")
            .to_uppercase();
        let method = match method.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "Invalid HTTP method: {other}. Must be GET, POST, PUT, PATCH, or DELETE."
                )));
            }
        };

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let timeout = arguments["timeout_secs"]
            .as_u64()
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let mut request = self.client.request(method.clone(), url).timeout(timeout);
        if let Some(headers) = arguments["headers"].as_object() {
            for (name, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(name.as_str(), value);
                }
            }
        }
        if let Some(body) = arguments["body"].as_str() {
            request = request.body(body.to_string());
        }

        debug!(%method, url, "Sending HTTP request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: "http_request".into(),
                    timeout_secs: timeout.as_secs(),
                }
            } else {
                Self::failed(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Self::failed(format!("Failed to read body: {e}")))?;
        let (body, truncated) = truncate(&body, MAX_BODY_BYTES);

        let mut output = format!("HTTP {status}\n\n{body}");
        if truncated {
            output.push_str("\n\n[response truncated]");
        }

        let data = serde_json::json!({
            "status": status.as_u16(),
            "truncated": truncated,
        });
        let result = if status.is_success() {
            ToolResult::ok(output)
        } else {
            ToolResult::failed(output)
        };
        Ok(result.with_data(data))
    }
}

/// Cut `text` to at most `max` bytes on a char boundary.
fn truncate(text: &str, max: usize) -> (&str, bool) {
    if text.len() <= max {
        return (text, false);
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;

    fn tool() -> HttpRequestTool {
        HttpRequestTool::new(Duration::from_secs(5)).unwrap()
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "aé";
        assert_eq!(truncate(text, 2), ("a", true));
        assert_eq!(truncate(text, 3), ("aé", false));
    }

    #[tokio::test]
    async fn rejects_bad_method_and_scheme() {
        let err = tool()
            .execute(serde_json::json!({"url": "http://x", "method": "TRACE"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = tool()
            .execute(serde_json::json!({"url": "ftp://example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let app = Router::new().route(
            "/psalm",
            get(|headers: HeaderMap| async move {
                let lang = headers
                    .get("x-lang")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("en")
                    .to_string();
                format!("The Lord is my shepherd ({lang})")
            }),
        );
        let base = serve(app).await;

        let result = tool()
            .execute(serde_json::json!({
                "url": format!("{base}/psalm"),
                "headers": {"x-lang": "la"}
            }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.starts_with("HTTP 200"));
        assert!(result.output.contains("The Lord is my shepherd (la)"));
        assert_eq!(result.data.unwrap()["status"], 200);
    }

    #[tokio::test]
    async fn post_echoes_body_and_error_status_is_failure() {
        let app = Router::new()
            .route("/echo", axum::routing::post(|body: String| async move { body }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));
        let base = serve(app).await;

        let echoed = tool()
            .execute(serde_json::json!({
                "url": format!("{base}/echo"),
                "method": "post",
                "body": "fiat lux"
            }))
            .await
            .unwrap();
        assert!(echoed.output.ends_with("fiat lux"));

        let missing = tool()
            .execute(serde_json::json!({"url": format!("{base}/missing")}))
            .await
            .unwrap();
        assert!(!missing.success);
        assert!(missing.output.starts_with("HTTP 404"));
    }
}
