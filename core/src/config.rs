use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::invoker::ToolEndpoint;
use crate::secret::SecretString;

pub const DEFAULT_PROJECT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_SERVER_LABEL: &str = "Azure_Functions_MCP_Server";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_USER_MESSAGE: &str =
    "Create a snippet called snippet1 that prints 'Hello, World!' in Python.";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required but not set")]
    Missing(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the orchestrator reads from the environment.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub project_endpoint: String,
    pub model: String,
    pub server_label: String,
    pub tool_endpoint: ToolEndpoint,
    pub user_message: String,
    pub poll_interval: Duration,
    pub catalog_path: Option<PathBuf>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        // Fail fast before anything else is touched
        let access_key = get("MCP_EXTENSION_KEY")
            .map(SecretString::new)
            .ok_or(ConfigError::Missing("MCP_EXTENSION_KEY"))?;

        let server_url = or_default("MCP_SERVER_URL", DEFAULT_SERVER_URL);
        let tool_endpoint = ToolEndpoint::parse(&server_url, access_key)?;

        let poll_interval = match get("POLL_INTERVAL_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid {
                    name: "POLL_INTERVAL_MS",
                    reason: format!("'{}': {}", raw, e),
                })?,
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            project_endpoint: or_default("PROJECT_ENDPOINT", DEFAULT_PROJECT_ENDPOINT),
            model: or_default("MODEL_DEPLOYMENT_NAME", DEFAULT_MODEL),
            server_label: or_default("MCP_SERVER_LABEL", DEFAULT_SERVER_LABEL),
            tool_endpoint,
            user_message: or_default("USER_MESSAGE", DEFAULT_USER_MESSAGE),
            poll_interval,
            catalog_path: get("TOOL_CATALOG_PATH").map(PathBuf::from),
        })
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!("- Project Endpoint: {}", self.project_endpoint);
        info!("- Model Deployment: {}", self.model);
        info!("- MCP Server Label: {}", self.server_label);
        info!("- MCP Server URL: {}", self.tool_endpoint.base());
        info!("- User Message: {}", self.user_message);
        info!("- Poll Interval: {:?}", self.poll_interval);
        info!("- MCP Extension Key: [REDACTED]");
    }
}
