use async_openai::{
    config::OpenAIConfig,
    types::{
        AssistantTools, AssistantToolsFunction, CreateAssistantRequestArgs,
        CreateMessageRequestArgs, CreateRunRequestArgs, CreateThreadRequestArgs,
        FunctionObjectArgs, LastError, MessageContent, MessageRole, RequiredAction, RunObject,
        RunStatus, SubmitToolOutputsRunRequest, ToolsOutputs,
    },
    Client,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::catalog::ToolDescriptor;
use crate::model::{ConversationMessage, RunSnapshot, RunState, ToolCall, ToolOutput};

const UNKNOWN_ERROR: &str = "Unknown error";

// What gets registered with the agent service for one session.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Vec<ToolDescriptor>,
}

/// The hosted agent service, as the run loop sees it. Every method is a
/// single remote call; errors are not retried.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<String>;
    async fn create_thread(&self) -> Result<String>;
    async fn post_user_message(&self, thread_id: &str, text: &str) -> Result<()>;
    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<RunSnapshot>;
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot>;
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunSnapshot>;
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ConversationMessage>>;
    async fn delete_agent(&self, agent_id: &str) -> Result<()>;
}

/// `AgentService` over the Assistants API (assistants play the agent role).
pub struct OpenAiAgentService {
    client: Client<OpenAIConfig>,
}

impl OpenAiAgentService {
    // The API key comes from OPENAI_API_KEY, read by async-openai itself.
    pub fn new(project_endpoint: &str) -> Self {
        let config = OpenAIConfig::new().with_api_base(project_endpoint);
        info!("Created agent service client for endpoint: {}", project_endpoint);
        Self {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl AgentService for OpenAiAgentService {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<String> {
        // 1. Convert catalog descriptors -> function tools
        let tools = definition
            .tools
            .iter()
            .map(|t| -> Result<AssistantTools> {
                let function = FunctionObjectArgs::default()
                    .name(&t.name)
                    .description(&t.description)
                    .parameters(t.parameters_schema())
                    .build()?;
                Ok(AssistantTools::Function(AssistantToolsFunction { function }))
            })
            .collect::<Result<Vec<_>>>()?;

        // 2. Register the agent
        let request = CreateAssistantRequestArgs::default()
            .model(&definition.model)
            .name(&definition.name)
            .instructions(&definition.instructions)
            .tools(tools)
            .build()?;

        let agent = self
            .client
            .assistants()
            .create(request)
            .await
            .context("create agent")?;
        Ok(agent.id)
    }

    async fn create_thread(&self) -> Result<String> {
        let request = CreateThreadRequestArgs::default().build()?;
        let thread = self
            .client
            .threads()
            .create(request)
            .await
            .context("create thread")?;
        Ok(thread.id)
    }

    async fn post_user_message(&self, thread_id: &str, text: &str) -> Result<()> {
        let request = CreateMessageRequestArgs::default()
            .role(MessageRole::User)
            .content(text.to_string())
            .build()?;
        self.client
            .threads()
            .messages(thread_id)
            .create(request)
            .await
            .context("post user message")?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<RunSnapshot> {
        let request = CreateRunRequestArgs::default()
            .assistant_id(agent_id)
            .build()?;
        let run = self
            .client
            .threads()
            .runs(thread_id)
            .create(request)
            .await
            .context("create run")?;
        Ok(snapshot(&run))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
        let run = self
            .client
            .threads()
            .runs(thread_id)
            .retrieve(run_id)
            .await
            .with_context(|| format!("get run {}", run_id))?;
        Ok(snapshot(&run))
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunSnapshot> {
        let request = SubmitToolOutputsRunRequest {
            tool_outputs: outputs
                .iter()
                .map(|o| ToolsOutputs {
                    tool_call_id: Some(o.call_id.clone()),
                    output: Some(o.result.clone()),
                })
                .collect(),
            stream: None,
        };

        let run = self
            .client
            .threads()
            .runs(thread_id)
            .submit_tool_outputs(run_id, request)
            .await
            .with_context(|| format!("submit tool outputs to run {}", run_id))?;
        Ok(snapshot(&run))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ConversationMessage>> {
        let response = self
            .client
            .threads()
            .messages(thread_id)
            .list(&[("order", "asc"), ("limit", "100")])
            .await
            .context("list messages")?;

        Ok(response
            .data
            .into_iter()
            .map(|m| {
                let text = m
                    .content
                    .iter()
                    .filter_map(|c| match c {
                        MessageContent::Text(t) => Some(t.text.value.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                ConversationMessage {
                    id: m.id,
                    role: role_name(&m.role).to_string(),
                    text,
                }
            })
            .collect())
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.client
            .assistants()
            .delete(agent_id)
            .await
            .with_context(|| format!("delete agent {}", agent_id))?;
        Ok(())
    }
}

fn role_name(role: &MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

fn snapshot(run: &RunObject) -> RunSnapshot {
    RunSnapshot::new(
        run.id.clone(),
        run_state(&run.status, run.required_action.as_ref(), run.last_error.as_ref()),
    )
}

fn run_state(
    status: &RunStatus,
    required: Option<&RequiredAction>,
    last_error: Option<&LastError>,
) -> RunState {
    match status {
        RunStatus::Queued => RunState::Queued,
        RunStatus::InProgress => RunState::InProgress,
        RunStatus::RequiresAction => RunState::RequiresAction {
            calls: required
                .map(|action| {
                    action
                        .submit_tool_outputs
                        .tool_calls
                        .iter()
                        .map(|c| ToolCall::new(&c.id, &c.function.name, &c.function.arguments))
                        .collect()
                })
                .unwrap_or_default(),
        },
        RunStatus::Cancelling => RunState::Cancelling,
        RunStatus::Cancelled => RunState::Cancelled,
        RunStatus::Failed => RunState::Failed {
            message: last_error
                .map(|e| e.message.clone())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        },
        RunStatus::Completed => RunState::Completed,
        RunStatus::Incomplete => RunState::Incomplete,
        RunStatus::Expired => RunState::Expired,
    }
}
