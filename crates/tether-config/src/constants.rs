//! Default constants for the Tether bridge
//!
//! Single source of truth for remote API versions, record identifiers,
//! streaming channels and timeout defaults.

// ============================================================================
// REMOTE DEBUGGER API
// ============================================================================

/// Version segment of the debugger command endpoint (`.../debug/v1/...`).
pub const DEBUG_API_VERSION: u32 = 1;

/// API version of the streaming endpoint (`.../cometd/62.0`).
pub const STREAMING_API_VERSION: &str = "62.0";

// ============================================================================
// RECORD IDENTIFIERS
// ============================================================================

/// 3-character type prefix of debugger session record ids.
pub const SESSION_ID_PREFIX: &str = "07a";

/// 3-character type prefix of debugger breakpoint record ids.
pub const BREAKPOINT_ID_PREFIX: &str = "07b";

/// Record type of a debugger session in the org.
pub const SESSION_RECORD_TYPE: &str = "DebuggerSession";

/// Record type of a debugger breakpoint in the org.
pub const BREAKPOINT_RECORD_TYPE: &str = "DebuggerBreakpoint";

/// Session status written to detach a session.
pub const SESSION_DETACH_STATUS: &str = "Detach";

/// Breakpoint record kinds.
pub const BREAKPOINT_TYPE_LINE: &str = "Line";
pub const BREAKPOINT_TYPE_EXCEPTION: &str = "Exception";

// ============================================================================
// EXCEPTION BREAK MODES
// ============================================================================

pub const EXCEPTION_BREAK_MODE_ALWAYS: &str = "always";
pub const EXCEPTION_BREAK_MODE_NEVER: &str = "never";

// ============================================================================
// STREAMING
// ============================================================================

/// Channel carrying session-level system events (terminations, warnings).
pub const SYSTEM_EVENT_CHANNEL: &str = "/systemTopic/DebuggerSystemEvent";

/// Channel carrying per-request user events (started, stopped, finished).
pub const USER_EVENT_CHANNEL: &str = "/systemTopic/DebuggerEvent";

/// Replay position advertised on first subscribe: deliver all retained events.
pub const REPLAY_ALL_AVAILABLE: i64 = -2;

// ============================================================================
// ORG CLI
// ============================================================================

/// Executable name of the org CLI used for record operations.
pub const DEFAULT_ORG_CLI: &str = "orgx";

/// Environment variable overriding the org CLI executable.
pub const ENV_ORG_CLI: &str = "TETHER_ORG_CLI";

// ============================================================================
// TIMEOUTS (milliseconds)
// ============================================================================

/// Remote debugger command timeout.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 20_000;

/// How long `initialize` waits for the source-location payload before
/// failing with a "language server not ready" error.
pub const DEFAULT_INITIALIZE_TIMEOUT_MS: u64 = 10_000;

/// Streaming long-poll request timeout. The server holds connect requests
/// open for up to two minutes, so this must comfortably exceed that.
pub const DEFAULT_STREAMING_TIMEOUT_MS: u64 = 130_000;

/// Backoff between streaming re-handshake attempts after a transport drop.
pub const STREAMING_RECONNECT_BACKOFF_MS: u64 = 1_000;
