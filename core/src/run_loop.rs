//! Poll-driven reconciliation of a remote run with local tool execution.
//!
//! The remote service owns the run state. The loop only reads it: it sleeps,
//! polls, and whenever the run is blocked on tools it resolves every pending
//! call (in order, one at a time) and submits the whole batch at once.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::invoker::ToolExecutor;
use crate::llm::AgentService;
use crate::model::{RunSnapshot, RunState, ToolCall, ToolOutput};

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Failed { message: String },
    /// Any other terminal state (cancelled, expired, incomplete).
    Stopped { status: &'static str },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

pub struct RunLoop {
    service: Arc<dyn AgentService>,
    executor: Arc<dyn ToolExecutor>,
    poll_interval: Duration,
}

impl RunLoop {
    pub fn new(
        service: Arc<dyn AgentService>,
        executor: Arc<dyn ToolExecutor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            service,
            executor,
            poll_interval,
        }
    }

    /// Drives `initial` to a terminal state. Service errors abort the loop.
    pub async fn drive(&self, thread_id: &str, initial: RunSnapshot) -> Result<RunOutcome> {
        let mut run = initial;

        while !run.state.is_terminal() {
            tokio::time::sleep(self.poll_interval).await;

            run = self.service.get_run(thread_id, &run.id).await?;
            debug!("Run status: {}", run.state.label());

            if let RunState::RequiresAction { calls } = &run.state {
                if calls.is_empty() {
                    warn!("Run {} requires action but listed no tool calls", run.id);
                    continue;
                }

                info!("Processing {} tool call(s)...", calls.len());
                let outputs = self.resolve(calls).await;
                run = self
                    .service
                    .submit_tool_outputs(thread_id, &run.id, &outputs)
                    .await?;
            }
        }

        let outcome = match run.state {
            RunState::Completed => {
                info!("Run completed successfully");
                RunOutcome::Completed
            }
            RunState::Failed { message } => {
                error!("Run failed: {}", message);
                RunOutcome::Failed { message }
            }
            other => {
                warn!("Run ended with status: {}", other.label());
                RunOutcome::Stopped {
                    status: other.label(),
                }
            }
        };
        Ok(outcome)
    }

    // One output per call, same order, ids echoed.
    async fn resolve(&self, calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            info!("Tool call: {} -> {}", call.id, call.name);
            outputs.push(self.executor.invoke(call).await);
        }
        outputs
    }
}
