pub mod catalog;
pub mod config;
pub mod invoker;
pub mod llm;
pub mod model;
pub mod run_loop;
pub mod secret;
pub mod session;

pub use catalog::{CatalogError, PropertySpec, ToolCatalog, ToolDescriptor};
pub use config::{AgentConfig, ConfigError};
pub use invoker::{HttpToolInvoker, InvokeError, ToolEndpoint, ToolExecutor};
pub use llm::{AgentDefinition, AgentService, OpenAiAgentService};
pub use model::{ConversationMessage, FailureKind, RunSnapshot, RunState, ToolCall, ToolOutput};
pub use run_loop::{RunLoop, RunOutcome};
pub use secret::SecretString;
pub use session::{AgentSession, SessionOptions, SessionReport};
