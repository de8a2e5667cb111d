use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::catalog::ToolCatalog;
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::invoker::ToolExecutor;
use crate::llm::{AgentDefinition, AgentService};
use crate::model::ConversationMessage;
use crate::run_loop::{RunLoop, RunOutcome};

pub const AGENT_NAME: &str = "my-mcp-agent";
pub const AGENT_INSTRUCTIONS: &str = "You are a helpful assistant. Use the tools provided to answer the user's questions. Be sure to cite your sources.";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub model: String,
    pub agent_name: String,
    pub instructions: String,
    pub poll_interval: Duration,
}

impl SessionOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            agent_name: AGENT_NAME.to_string(),
            instructions: AGENT_INSTRUCTIONS.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub agent_id: String,
    pub thread_id: String,
    pub run_id: String,
    pub outcome: RunOutcome,
    pub messages: Vec<ConversationMessage>,
}

/// One user message, one agent, one run. The agent is created at the start
/// and deleted at the end, whatever happens in between.
pub struct AgentSession {
    service: Arc<dyn AgentService>,
    executor: Arc<dyn ToolExecutor>,
    options: SessionOptions,
}

impl AgentSession {
    pub fn new(
        service: Arc<dyn AgentService>,
        executor: Arc<dyn ToolExecutor>,
        options: SessionOptions,
    ) -> Self {
        Self {
            service,
            executor,
            options,
        }
    }

    pub async fn run(&self, catalog: &ToolCatalog, user_message: &str) -> Result<SessionReport> {
        // 1. Create the agent with every catalog tool
        info!("Creating agent with tools: {}", catalog.names().join(", "));
        let definition = AgentDefinition {
            name: self.options.agent_name.clone(),
            model: self.options.model.clone(),
            instructions: self.options.instructions.clone(),
            tools: catalog.iter().cloned().collect(),
        };
        let agent_id = self.service.create_agent(&definition).await?;
        info!("Created agent, agent ID: {}", agent_id);

        // 2-6. Everything after this point is covered by cleanup
        let result = self.converse(&agent_id, user_message).await;

        // 7. Release the agent exactly once; a failure here never masks `result`
        info!("Cleaning up resources...");
        match self.service.delete_agent(&agent_id).await {
            Ok(()) => info!("Deleted agent, agent ID: {}", agent_id),
            Err(e) => warn!("Failed to delete agent {}: {:#}", agent_id, e),
        }

        result
    }

    async fn converse(&self, agent_id: &str, user_message: &str) -> Result<SessionReport> {
        let thread_id = self.service.create_thread().await?;
        info!("Created thread, thread ID: {}", thread_id);

        self.service.post_user_message(&thread_id, user_message).await?;
        info!("Created message with content: {}", user_message);

        let run = self.service.create_run(&thread_id, agent_id).await?;
        let run_id = run.id.clone();
        info!("Started run, run ID: {}", run_id);

        info!("Monitoring run status...");
        let run_loop = RunLoop::new(
            self.service.clone(),
            self.executor.clone(),
            self.options.poll_interval,
        );
        let outcome = run_loop.drive(&thread_id, run).await?;

        info!("Retrieving messages...");
        let messages = self.service.list_messages(&thread_id).await?;

        Ok(SessionReport {
            agent_id: agent_id.to_string(),
            thread_id,
            run_id,
            outcome,
            messages,
        })
    }
}
