use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::config::ConfigError;
use crate::model::{FailureKind, ToolCall, ToolOutput};
use crate::secret::SecretString;

// Older deployments hand out the SSE webhook URL; the tool endpoints live next to it.
const LEGACY_SSE_SUFFIX: &str = "/runtime/webhooks/mcp/sse";
const ACCESS_KEY_PARAM: &str = "code";
const EMPTY_CONTENT: &str = "Function executed successfully";

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Transport(String),
    #[error("HTTP {0}")]
    HttpStatus(StatusCode),
    #[error("malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

impl InvokeError {
    fn transport(err: reqwest::Error) -> Self {
        // The request URL carries the access key, so it never reaches the message.
        InvokeError::Transport(error_chain(&err.without_url()))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            InvokeError::InvalidArguments(_) => FailureKind::InvalidArguments,
            InvokeError::Transport(_) => FailureKind::Transport,
            InvokeError::HttpStatus(status) => FailureKind::HttpStatus(status.as_u16()),
            InvokeError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Where the tool server lives and the key it expects in `?code=`.
#[derive(Debug, Clone)]
pub struct ToolEndpoint {
    base: Url,
    access_key: SecretString,
}

impl ToolEndpoint {
    pub fn parse(base: &str, access_key: impl Into<SecretString>) -> Result<Self, ConfigError> {
        let trimmed = base.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(LEGACY_SSE_SUFFIX).unwrap_or(trimmed);

        let base = Url::parse(trimmed).map_err(|e| ConfigError::Invalid {
            name: "MCP_SERVER_URL",
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                name: "MCP_SERVER_URL",
                reason: format!("'{}' cannot carry a path", base),
            });
        }

        Ok(Self {
            base,
            access_key: access_key.into(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `<base>/api/<tool>?code=<key>`
    pub fn url_for(&self, tool: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", tool]);
        }
        url.query_pairs_mut()
            .append_pair(ACCESS_KEY_PARAM, self.access_key.expose_secret());
        url
    }
}

/// Renders `url` for logs with the access key replaced by `[REDACTED]`.
pub fn redact(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }

    let query = url
        .query_pairs()
        .map(|(k, v)| {
            if k == ACCESS_KEY_PARAM {
                format!("{}=[REDACTED]", k)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&");

    let mut shown = url.clone();
    shown.set_query(None);
    format!("{}?{}", shown, query)
}

/// Resolves one tool call into its output. Never fails: errors become the
/// output text so a single bad call cannot block the batch.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(&self, call: &ToolCall) -> ToolOutput;
}

pub struct HttpToolInvoker {
    client: Client,
    endpoint: ToolEndpoint,
}

impl HttpToolInvoker {
    pub fn new(endpoint: ToolEndpoint) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    // POST {"arguments": ...} to the tool's endpoint and normalize the reply.
    pub async fn call(&self, tool: &str, arguments_json: &str) -> Result<String, InvokeError> {
        // A. Parse the arguments the agent produced
        let arguments = parse_arguments(arguments_json)?;

        // B. Resolve the endpoint
        let url = self.endpoint.url_for(tool);
        info!("Calling tool endpoint: {}", redact(&url));

        // C. Send (single attempt, transport default timeout)
        let response = self
            .client
            .post(url)
            .json(&json!({ "arguments": arguments }))
            .send()
            .await
            .map_err(InvokeError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(InvokeError::transport)?;

        if !status.is_success() {
            error!("Tool '{}' call failed: {} - {}", tool, status, body);
            return Err(InvokeError::HttpStatus(status));
        }

        info!("Tool '{}' response: {}", tool, body);
        extract_content(&body)
    }
}

#[async_trait]
impl ToolExecutor for HttpToolInvoker {
    async fn invoke(&self, call: &ToolCall) -> ToolOutput {
        match self.call(&call.name, &call.arguments_json).await {
            Ok(result) => ToolOutput::success(&call.id, result),
            Err(e) => {
                error!("Error calling tool '{}' ({}): {}", call.name, call.id, e);
                ToolOutput::failure(
                    &call.id,
                    format!("Error calling {}: {}", call.name, e),
                    e.kind(),
                )
            }
        }
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, InvokeError> {
    // Parameterless tools are sent "" or "{}".
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InvokeError::InvalidArguments(format!(
            "expected a JSON object, got `{}`",
            other
        ))),
        Err(e) => Err(InvokeError::InvalidArguments(e.to_string())),
    }
}

fn extract_content(body: &str) -> Result<String, InvokeError> {
    let parsed: Value = serde_json::from_str(body).map_err(InvokeError::MalformedResponse)?;

    Ok(match parsed.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) => EMPTY_CONTENT.to_string(),
        Some(other) => other.to_string(),
        None => body.to_string(),
    })
}
