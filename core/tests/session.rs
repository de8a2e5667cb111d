use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snipline_core::{
    AgentDefinition, AgentService, AgentSession, ConversationMessage, FailureKind,
    HttpToolInvoker, RunOutcome, RunSnapshot, RunState, SessionOptions, ToolCall, ToolCatalog,
    ToolEndpoint, ToolOutput,
};

const RUN_ID: &str = "run_1";

#[derive(Debug, Default)]
struct Calls {
    agents: Vec<AgentDefinition>,
    user_messages: Vec<String>,
    polls: usize,
    poll_times: Vec<Instant>,
    submissions: Vec<Vec<ToolOutput>>,
    deletes: Vec<String>,
}

/// Agent service fake that replays a fixed sequence of run states. Polling
/// past the end of the script is an error, so over-polling fails the test.
struct ScriptedService {
    initial: RunState,
    polls: Mutex<VecDeque<Result<RunState, String>>>,
    after_submit: RunState,
    fail_create_agent: bool,
    fail_delete: bool,
    calls: Mutex<Calls>,
}

impl ScriptedService {
    fn new(initial: RunState, polls: Vec<RunState>) -> Self {
        Self {
            initial,
            polls: Mutex::new(polls.into_iter().map(Ok).collect()),
            after_submit: RunState::InProgress,
            fail_create_agent: false,
            fail_delete: false,
            calls: Mutex::new(Calls::default()),
        }
    }

    fn then_error(self, message: &str) -> Self {
        self.polls.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AgentService for ScriptedService {
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<String> {
        if self.fail_create_agent {
            return Err(anyhow!("quota exceeded"));
        }
        self.calls().agents.push(definition.clone());
        Ok("asst_1".to_string())
    }

    async fn create_thread(&self) -> Result<String> {
        Ok("thread_1".to_string())
    }

    async fn post_user_message(&self, _thread_id: &str, text: &str) -> Result<()> {
        self.calls().user_messages.push(text.to_string());
        Ok(())
    }

    async fn create_run(&self, _thread_id: &str, _agent_id: &str) -> Result<RunSnapshot> {
        Ok(RunSnapshot::new(RUN_ID, self.initial.clone()))
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<RunSnapshot> {
        assert_eq!(run_id, RUN_ID);
        {
            let mut calls = self.calls();
            calls.polls += 1;
            calls.poll_times.push(Instant::now());
        }
        match self.polls.lock().unwrap().pop_front() {
            Some(Ok(state)) => Ok(RunSnapshot::new(RUN_ID, state)),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("polled after the script ended")),
        }
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        _run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<RunSnapshot> {
        self.calls().submissions.push(outputs.to_vec());
        Ok(RunSnapshot::new(RUN_ID, self.after_submit.clone()))
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ConversationMessage>> {
        Ok(vec![ConversationMessage {
            id: "msg_1".to_string(),
            role: "assistant".to_string(),
            text: "Done.".to_string(),
        }])
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.calls().deletes.push(agent_id.to_string());
        if self.fail_delete {
            return Err(anyhow!("service unavailable"));
        }
        Ok(())
    }
}

fn requires(calls: Vec<ToolCall>) -> RunState {
    RunState::RequiresAction { calls }
}

fn session(service: &Arc<ScriptedService>, tool_base: &str) -> AgentSession {
    session_polling_every(service, tool_base, Duration::ZERO)
}

fn session_polling_every(
    service: &Arc<ScriptedService>,
    tool_base: &str,
    interval: Duration,
) -> AgentSession {
    let invoker = HttpToolInvoker::new(ToolEndpoint::parse(tool_base, "key").unwrap());
    AgentSession::new(
        service.clone(),
        Arc::new(invoker),
        SessionOptions::new("gpt-4.1-mini").with_poll_interval(interval),
    )
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn tool_round_trip_completes_the_run() {
    let tools = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/get_snippet"))
        .and(query_param("code", "key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "print('Hello')" })))
        .expect(1)
        .mount(&tools)
        .await;

    let service = Arc::new(ScriptedService::new(
        RunState::Queued,
        vec![
            RunState::Queued,
            RunState::InProgress,
            requires(vec![ToolCall::new("t1", "get_snippet", r#"{"snippetname":"foo"}"#)]),
            RunState::InProgress,
            RunState::Completed,
        ],
    ));

    let catalog = ToolCatalog::builtin().unwrap();
    let report = session(&service, &tools.uri())
        .run(&catalog, "Fetch foo")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.run_id, RUN_ID);
    assert_eq!(report.messages.len(), 1);

    let calls = service.calls();
    assert_eq!(calls.polls, 5);
    assert_eq!(calls.submissions, vec![vec![ToolOutput::success("t1", "print('Hello')")]]);
    assert_eq!(calls.deletes, vec!["asst_1".to_string()]);
    assert_eq!(calls.user_messages, vec!["Fetch foo".to_string()]);
    assert_eq!(calls.agents[0].tools.len(), catalog.len());
}

#[tokio::test(start_paused = true)]
async fn each_poll_waits_one_interval() {
    let interval = Duration::from_millis(500);
    let service = Arc::new(ScriptedService::new(
        RunState::Queued,
        vec![RunState::Queued, RunState::InProgress, RunState::Completed],
    ));

    let started = Instant::now();
    let report = session_polling_every(&service, "http://localhost:3000", interval)
        .run(&ToolCatalog::builtin().unwrap(), "Say hello")
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.outcome, RunOutcome::Completed);
    // The paused clock only moves when every task is waiting on a timer,
    // landing on millisecond ticks.
    let tick = Duration::from_millis(1);
    assert!(elapsed >= interval * 3 && elapsed <= interval * 3 + tick * 3, "{:?}", elapsed);

    let calls = service.calls();
    assert_eq!(calls.polls, 3);
    let mut previous = started;
    for at in &calls.poll_times {
        let gap = *at - previous;
        assert!(gap >= interval && gap <= interval + tick, "{:?}", gap);
        previous = *at;
    }
}

#[tokio::test]
async fn every_pending_call_gets_exactly_one_output() {
    let tools = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/hello_mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "Hello I am MCPTool!" })))
        .expect(1)
        .mount(&tools)
        .await;
    // Anything else (e.g. an unknown tool) falls through to wiremock's 404.

    let batch = vec![
        ToolCall::new("a", "hello_mcp", "{}"),
        ToolCall::new("b", "get_snippet", "{not json"),
        ToolCall::new("c", "drop_tables", "{}"),
    ];
    let service = Arc::new(ScriptedService::new(
        RunState::Queued,
        vec![requires(batch), RunState::Completed],
    ));

    let report = session(&service, &tools.uri())
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();
    assert!(report.outcome.is_success());

    let calls = service.calls();
    assert_eq!(calls.submissions.len(), 1);
    let submitted = &calls.submissions[0];
    assert_eq!(submitted.len(), 3);

    let mut ids: Vec<&str> = submitted.iter().map(|o| o.call_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let by_id = |id: &str| submitted.iter().find(|o| o.call_id == id).unwrap();
    assert_eq!(by_id("a").result, "Hello I am MCPTool!");
    assert_eq!(by_id("b").error, Some(FailureKind::InvalidArguments));
    assert!(by_id("b").result.contains("get_snippet"));
    assert_eq!(by_id("c").error, Some(FailureKind::HttpStatus(404)));
    assert!(by_id("c").result.contains("404"));
}

#[tokio::test]
async fn unreachable_tool_server_still_submits_and_continues() {
    let service = Arc::new(ScriptedService::new(
        RunState::InProgress,
        vec![
            requires(vec![ToolCall::new("t1", "get_snippet", r#"{"snippetname":"foo"}"#)]),
            RunState::InProgress,
            RunState::Completed,
        ],
    ));

    let report = session(&service, &closed_port_url())
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    let calls = service.calls();
    assert_eq!(calls.polls, 3);
    let output = &calls.submissions[0][0];
    assert_eq!(output.call_id, "t1");
    assert_eq!(output.error, Some(FailureKind::Transport));
    assert!(output.result.starts_with("Error calling get_snippet: "));
}

#[tokio::test]
async fn failed_run_is_reported_and_cleaned_up() {
    let service = Arc::new(ScriptedService::new(
        RunState::Queued,
        vec![
            RunState::InProgress,
            RunState::Failed {
                message: "rate limit exceeded".to_string(),
            },
        ],
    ));

    let report = session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            message: "rate limit exceeded".to_string()
        }
    );
    let calls = service.calls();
    assert_eq!(calls.polls, 2);
    assert!(calls.submissions.is_empty());
    assert_eq!(calls.deletes.len(), 1);
}

#[tokio::test]
async fn terminal_run_is_never_polled() {
    let service = Arc::new(ScriptedService::new(RunState::Completed, vec![]));

    let report = session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(service.calls().polls, 0);
    assert_eq!(service.calls().deletes.len(), 1);
}

#[tokio::test]
async fn other_terminal_states_stop_the_loop() {
    let service = Arc::new(ScriptedService::new(
        RunState::Queued,
        vec![RunState::Cancelling, RunState::Cancelled],
    ));

    let report = session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Stopped { status: "cancelled" });
    assert_eq!(service.calls().polls, 2);
}

#[tokio::test]
async fn empty_action_batch_is_not_submitted() {
    let service = Arc::new(ScriptedService::new(
        RunState::Queued,
        vec![requires(vec![]), RunState::Completed],
    ));

    session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();

    let calls = service.calls();
    assert!(calls.submissions.is_empty());
    assert_eq!(calls.polls, 2);
}

#[tokio::test]
async fn poll_error_aborts_but_agent_is_still_deleted_once() {
    let service = Arc::new(
        ScriptedService::new(RunState::Queued, vec![RunState::InProgress])
            .then_error("connection reset by peer"),
    );

    let err = session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("connection reset by peer"));
    let calls = service.calls();
    assert_eq!(calls.polls, 2);
    assert_eq!(calls.deletes, vec!["asst_1".to_string()]);
}

#[tokio::test]
async fn cleanup_failure_does_not_mask_the_outcome() {
    let mut scripted = ScriptedService::new(RunState::Queued, vec![RunState::Completed]);
    scripted.fail_delete = true;
    let service = Arc::new(scripted);

    let report = session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(service.calls().deletes.len(), 1);
}

#[tokio::test]
async fn nothing_to_clean_up_when_agent_creation_fails() {
    let mut scripted = ScriptedService::new(RunState::Queued, vec![]);
    scripted.fail_create_agent = true;
    let service = Arc::new(scripted);

    let err = session(&service, "http://127.0.0.1:9")
        .run(&ToolCatalog::builtin().unwrap(), "hi")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("quota exceeded"));
    assert!(service.calls().deletes.is_empty());
}
