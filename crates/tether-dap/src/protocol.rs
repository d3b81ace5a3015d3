//! DAP (Debug Adapter Protocol) message types
//!
//! Based on <https://microsoft.github.io/debug-adapter-protocol/specification>
//!
//! The protocol uses JSON-RPC style messages with Content-Length headers:
//! ```text
//! Content-Length: 119\r\n
//! \r\n
//! {"seq":1,"type":"request","command":"initialize","arguments":{"adapterID":"tether"}}
//! ```

use serde::{Deserialize, Serialize};

// ============================================================
// BASE PROTOCOL MESSAGE
// ============================================================

/// Base protocol message - all DAP messages extend this
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProtocolMessage {
    /// Request message from client to adapter
    Request(Request),
    /// Response message from adapter to client
    Response(Response),
    /// Event notification from adapter to client
    Event(Event),
}

impl ProtocolMessage {
    pub fn seq(&self) -> i64 {
        match self {
            ProtocolMessage::Request(r) => r.seq,
            ProtocolMessage::Response(r) => r.seq,
            ProtocolMessage::Event(e) => e.seq,
        }
    }
}

// ============================================================
// REQUEST
// ============================================================

/// Request message sent from client to adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Sequence number for message ordering
    pub seq: i64,
    /// Command to execute
    pub command: String,
    /// Command-specific arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

impl Request {
    pub fn new(seq: i64, command: impl Into<String>) -> Self {
        Self {
            seq,
            command: command.into(),
            arguments: None,
        }
    }

    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

// ============================================================
// RESPONSE
// ============================================================

/// Response message sent from adapter to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number
    pub seq: i64,
    /// Sequence number of the corresponding request
    pub request_seq: i64,
    /// Command this response is for
    pub command: String,
    /// Success indicator
    pub success: bool,
    /// Error message if not successful
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Response {
    pub fn success(seq: i64, request_seq: i64, command: impl Into<String>) -> Self {
        Self {
            seq,
            request_seq,
            command: command.into(),
            success: true,
            message: None,
            body: None,
        }
    }

    pub fn error(
        seq: i64,
        request_seq: i64,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            seq,
            request_seq,
            command: command.into(),
            success: false,
            message: Some(message.into()),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

// ============================================================
// EVENT
// ============================================================

/// Event notification sent from adapter to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number
    pub seq: i64,
    /// Event type
    pub event: String,
    /// Event-specific data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl Event {
    pub fn new(seq: i64, event: impl Into<String>) -> Self {
        Self {
            seq,
            event: event.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

// ============================================================
// INITIALIZE
// ============================================================

/// Arguments for initialize request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequestArguments {
    /// Unique ID of the client (e.g. "vscode")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// ID of the debug adapter
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    /// Lines start at 1 (default) or 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines_start_at1: Option<bool>,
    /// Path format ("path" or "uri")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_format: Option<String>,
}

/// Capabilities returned in initialize response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_configuration_done_request: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_conditional_breakpoints: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_delayed_stack_trace_loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_evaluate_for_hovers: Option<bool>,
}

// ============================================================
// LAUNCH
// ============================================================

/// Launch arguments of the bridge. `project` is the workspace directory the
/// org CLI resolves its default org from; the filters narrow which remote
/// requests the session debugs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequestArguments {
    pub project: String,
    #[serde(default)]
    pub user_id_filter: Vec<String>,
    #[serde(default)]
    pub request_type_filter: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point_filter: Option<String>,
    /// Enables debug-level adapter logging for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
}

// ============================================================
// BREAKPOINTS
// ============================================================

/// Arguments for setBreakpoints request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    /// Source file location
    pub source: Source,
    /// Breakpoint specifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
}

/// Source file reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Source {
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self {
            path: Some(path),
            name,
        }
    }
}

/// Source breakpoint specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    /// Line number (1-based)
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Response body for setBreakpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsResponseBody {
    /// Verification outcome per requested breakpoint, in request order
    pub breakpoints: Vec<Breakpoint>,
}

/// Breakpoint information returned by adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    /// Whether the line is executable and installed in the org
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Arguments for the standard setExceptionBreakpoints request.
///
/// Exception break modes are driven by the custom `exceptionBreakpoint`
/// request instead; the standard request is acknowledged and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetExceptionBreakpointsArguments {
    pub filters: Vec<String>,
}

/// Arguments for the custom exceptionBreakpoint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionBreakpointArguments {
    /// Typeref of the exception type to configure.
    pub typeref: String,
    /// `always` installs a breakpoint record, `never` removes it. Any other
    /// mode is accepted and ignored.
    pub break_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

// ============================================================
// EXECUTION CONTROL
// ============================================================

/// Shared argument shape of continue/next/stepIn/stepOut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadArguments {
    pub thread_id: i64,
}

/// Arguments for stackTrace request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    pub thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<usize>,
}

/// Arguments for scopes request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    pub frame_id: i64,
}

/// Arguments for variables request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    pub variables_reference: i64,
}

// ============================================================
// RESPONSE BODIES
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsResponseBody {
    pub threads: Vec<Thread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponseBody {
    pub stack_frames: Vec<StackFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: String,
    pub variables_reference: i64,
    pub expensive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopesResponseBody {
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub variables_reference: i64,
}

// ============================================================
// EVENT BODIES
// ============================================================

/// Stopped event body - sent when a remote request pauses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// Reason for stopping ("breakpoint", "step")
    pub reason: String,
    pub thread_id: i64,
    /// Always true: the editor focuses paused requests even though other
    /// remote requests keep running.
    pub all_threads_stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    /// "started" or "exited"
    pub reason: String,
    pub thread_id: i64,
}

/// Output event body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    /// Category of output ("console", "stdout", "stderr", "telemetry")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Output text
    pub output: String,
}

impl OutputEventBody {
    pub fn console(output: impl Into<String>) -> Self {
        Self {
            category: Some("console".to_string()),
            output: output.into(),
        }
    }

    pub fn stderr(output: impl Into<String>) -> Self {
        Self {
            category: Some("stderr".to_string()),
            output: output.into(),
        }
    }
}

/// Custom showMessage event body, rendered by the editor shell as a
/// notification toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowMessageEventBody {
    /// "info", "warning" or "error"
    #[serde(rename = "type")]
    pub message_type: String,
    pub message: String,
}
