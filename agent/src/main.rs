use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snipline_core::{
    AgentConfig, AgentSession, HttpToolInvoker, OpenAiAgentService, RunOutcome, SessionOptions,
    ToolCatalog,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    exit_code(start().await)
}

async fn start() -> anyhow::Result<()> {
    // A missing access key stops us here, before any remote call.
    let config = AgentConfig::from_env().context("invalid configuration")?;

    info!("Starting agent service with remote snippet tools");
    run(config).await
}

// The single place a fatal error is reported.
fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error occurred while running agent service: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    config.log_summary();

    let catalog = match &config.catalog_path {
        Some(path) => ToolCatalog::load(path).await?,
        None => ToolCatalog::builtin()?,
    };

    let service = Arc::new(OpenAiAgentService::new(&config.project_endpoint));
    let invoker = Arc::new(HttpToolInvoker::new(config.tool_endpoint.clone()));
    let options = SessionOptions::new(config.model.clone()).with_poll_interval(config.poll_interval);

    let report = AgentSession::new(service, invoker, options)
        .run(&catalog, &config.user_message)
        .await?;

    match &report.outcome {
        RunOutcome::Completed => info!("Run {} completed successfully", report.run_id),
        RunOutcome::Failed { message } => error!("Run {} failed: {}", report.run_id, message),
        RunOutcome::Stopped { status } => info!("Run {} ended with status: {}", report.run_id, status),
    }

    info!("=== Conversation History ===");
    for message in &report.messages {
        info!("{}: {}", message.role, message.text);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_a_failing_exit_code() {
        assert_eq!(exit_code(Ok(())), ExitCode::SUCCESS);
        assert_eq!(
            exit_code(Err(anyhow::anyhow!("MCP_EXTENSION_KEY environment variable is required"))),
            ExitCode::FAILURE
        );
    }
}
