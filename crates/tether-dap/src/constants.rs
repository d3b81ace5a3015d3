//! Protocol string constants
//!
//! Request commands, event names and the custom requests the editor shell
//! sends beyond the DAP baseline.

// ============================================================================
// STANDARD REQUESTS
// ============================================================================

pub const REQUEST_INITIALIZE: &str = "initialize";
pub const REQUEST_LAUNCH: &str = "launch";
pub const REQUEST_CONFIGURATION_DONE: &str = "configurationDone";
pub const REQUEST_DISCONNECT: &str = "disconnect";
pub const REQUEST_SET_BREAKPOINTS: &str = "setBreakpoints";
pub const REQUEST_SET_EXCEPTION_BREAKPOINTS: &str = "setExceptionBreakpoints";
pub const REQUEST_CONTINUE: &str = "continue";
pub const REQUEST_NEXT: &str = "next";
pub const REQUEST_STEP_IN: &str = "stepIn";
pub const REQUEST_STEP_OUT: &str = "stepOut";
pub const REQUEST_THREADS: &str = "threads";
pub const REQUEST_STACK_TRACE: &str = "stackTrace";
pub const REQUEST_SCOPES: &str = "scopes";
pub const REQUEST_VARIABLES: &str = "variables";

// ============================================================================
// CUSTOM REQUESTS (editor shell extensions)
// ============================================================================

/// Pushes the source-location index computed by the language analysis side.
pub const REQUEST_LINE_BREAKPOINT_INFO: &str = "lineBreakpointInfo";

/// Pushes proxy and timeout settings before launch.
pub const REQUEST_WORKSPACE_SETTINGS: &str = "workspaceSettings";

/// Sets the break mode for one exception typeref.
pub const REQUEST_EXCEPTION_BREAKPOINT: &str = "exceptionBreakpoint";

/// Lists typerefs whose break mode is currently `always`.
pub const REQUEST_LIST_EXCEPTION_BREAKPOINTS: &str = "listExceptionBreakpoints";

// ============================================================================
// EVENTS
// ============================================================================

pub const EVENT_INITIALIZED: &str = "initialized";
pub const EVENT_STOPPED: &str = "stopped";
pub const EVENT_THREAD: &str = "thread";
pub const EVENT_TERMINATED: &str = "terminated";
pub const EVENT_OUTPUT: &str = "output";

/// Custom event asking the editor shell to surface a message to the user.
pub const EVENT_SHOW_MESSAGE: &str = "showMessage";

// ============================================================================
// EVENT BODY VALUES
// ============================================================================

pub const STOP_REASON_BREAKPOINT: &str = "breakpoint";
pub const STOP_REASON_STEP: &str = "step";

pub const THREAD_REASON_STARTED: &str = "started";
pub const THREAD_REASON_EXITED: &str = "exited";

pub const SHOW_MESSAGE_TYPE_WARNING: &str = "warning";
pub const SHOW_MESSAGE_TYPE_ERROR: &str = "error";
