//! Stateless debugger command builders
//!
//! Each command describes one HTTP POST against the remote debugger API:
//! `<instance>/services/debug/v1/<name>/<request-id>[?query]` with an
//! optional JSON body. Execution lives in [`crate::RequestService`].

use serde_json::json;

/// One command against the remote debugger API.
pub trait DebuggerCommand {
    /// Command segment of the endpoint path.
    fn name(&self) -> &'static str;

    /// Remote request id the command addresses.
    fn request_id(&self) -> &str;

    /// Optional query string (without the leading `?`).
    fn query(&self) -> Option<String> {
        None
    }

    /// Optional JSON request body.
    fn body(&self) -> Option<String> {
        None
    }
}

/// Resume a paused request.
pub struct RunCommand {
    request_id: String,
}

impl RunCommand {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl DebuggerCommand for RunCommand {
    fn name(&self) -> &'static str {
        "run"
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Step granularity, encoded as the `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Into,
    Over,
    Out,
}

impl StepKind {
    fn as_query_value(self) -> &'static str {
        match self {
            StepKind::Into => "into",
            StepKind::Over => "over",
            StepKind::Out => "out",
        }
    }
}

/// Step a paused request by one increment.
pub struct StepCommand {
    request_id: String,
    kind: StepKind,
}

impl StepCommand {
    pub fn new(request_id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            request_id: request_id.into(),
            kind,
        }
    }
}

impl DebuggerCommand for StepCommand {
    fn name(&self) -> &'static str {
        "step"
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn query(&self) -> Option<String> {
        Some(format!("type={}", self.kind.as_query_value()))
    }
}

/// Fetch the full execution state of a request: stack, top-frame variables,
/// references.
pub struct StateCommand {
    request_id: String,
}

impl StateCommand {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl DebuggerCommand for StateCommand {
    fn name(&self) -> &'static str {
        "state"
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Fetch the variables of one stack frame.
pub struct FrameCommand {
    request_id: String,
    frame_number: u32,
}

impl FrameCommand {
    pub fn new(request_id: impl Into<String>, frame_number: u32) -> Self {
        Self {
            request_id: request_id.into(),
            frame_number,
        }
    }
}

impl DebuggerCommand for FrameCommand {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn query(&self) -> Option<String> {
        Some(format!("stackFrame={}", self.frame_number))
    }
}

/// Dereference a batch of numeric reference handles.
pub struct ReferencesCommand {
    request_id: String,
    reference_ids: Vec<i64>,
}

impl ReferencesCommand {
    pub fn new(request_id: impl Into<String>, reference_ids: Vec<i64>) -> Self {
        Self {
            request_id: request_id.into(),
            reference_ids,
        }
    }
}

impl DebuggerCommand for ReferencesCommand {
    fn name(&self) -> &'static str {
        "references"
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn body(&self) -> Option<String> {
        let references: Vec<_> = self
            .reference_ids
            .iter()
            .map(|id| json!({ "id": id }))
            .collect();
        Some(json!({ "getReferencesRequest": { "reference": references } }).to_string())
    }
}
