/// A tool invocation requested by the remote agent. Consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments_json: arguments_json.into(),
        }
    }
}

/// Reason code attached to a failed tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidArguments,
    Transport,
    HttpStatus(u16),
    MalformedResponse,
}

/// The answer to one `ToolCall`; `call_id` always echoes the call's id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub call_id: String,
    pub result: String,
    // None on success
    pub error: Option<FailureKind>,
}

impl ToolOutput {
    pub fn success(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            result: result.into(),
            error: None,
        }
    }

    pub fn failure(call_id: impl Into<String>, result: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            call_id: call_id.into(),
            result: result.into(),
            error: Some(kind),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Remote run status, as last observed. The agent service owns the truth.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Queued,
    InProgress,
    RequiresAction { calls: Vec<ToolCall> },
    Cancelling,
    Cancelled,
    Failed { message: String },
    Completed,
    Incomplete,
    Expired,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RunState::Queued
                | RunState::InProgress
                | RunState::RequiresAction { .. }
                | RunState::Cancelling
        )
    }

    /// Short status label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::InProgress => "in_progress",
            RunState::RequiresAction { .. } => "requires_action",
            RunState::Cancelling => "cancelling",
            RunState::Cancelled => "cancelled",
            RunState::Failed { .. } => "failed",
            RunState::Completed => "completed",
            RunState::Incomplete => "incomplete",
            RunState::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub id: String,
    pub state: RunState,
}

impl RunSnapshot {
    pub fn new(id: impl Into<String>, state: RunState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub id: String,
    pub role: String,
    pub text: String,
}
