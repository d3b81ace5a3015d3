//! Streamed debugger event types
//!
//! The org pushes debugger events over the long-poll streaming transport.
//! Each message carries a replay position (used for resume and dedupe) and a
//! record describing what happened in the remote debugger.

use serde::{Deserialize, Serialize};

/// Event kinds published by the remote debugger.
///
/// The wire value is the `Type` field of the event record. Kinds the bridge
/// does not react to are still modeled so that dispatch stays exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebuggerEventType {
    Exception,
    Debug,
    LogLine,
    OrgChange,
    Ready,
    RequestFinished,
    RequestStarted,
    Resumed,
    SessionTerminated,
    Stopped,
    SystemGack,
    SystemInfo,
    SystemWarning,
    /// Forward compatibility: event kinds added on the server side after
    /// this client was built.
    #[serde(other)]
    Unknown,
}

/// One message delivered on a streaming channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub event: StreamEventInfo,
    pub sobject: DebuggerEventRecord,
}

/// Envelope metadata attached by the streaming transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEventInfo {
    /// Monotonically increasing, server-assigned replay position.
    pub replay_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
}

/// The debugger event record itself. Field names follow the remote service's
/// PascalCase JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DebuggerEventRecord {
    #[serde(rename = "Type")]
    pub event_type: DebuggerEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl Default for DebuggerEventType {
    fn default() -> Self {
        DebuggerEventType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_message_deserialization() {
        let json = r#"{
            "event": {"replayId": 7, "createdDate": "2026-01-05T10:00:00.000Z"},
            "sobject": {
                "Type": "RequestStarted",
                "SessionId": "07aFAKESESSION",
                "RequestId": "07nFAKEREQUEST"
            }
        }"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.event.replay_id, 7);
        assert_eq!(msg.sobject.event_type, DebuggerEventType::RequestStarted);
        assert_eq!(msg.sobject.session_id.as_deref(), Some("07aFAKESESSION"));
        assert_eq!(msg.sobject.request_id.as_deref(), Some("07nFAKEREQUEST"));
        assert!(msg.sobject.breakpoint_id.is_none());
    }

    #[test]
    fn test_unknown_event_type_does_not_fail() {
        let json = r#"{
            "event": {"replayId": 1},
            "sobject": {"Type": "SomethingNew"}
        }"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sobject.event_type, DebuggerEventType::Unknown);
    }

    #[test]
    fn test_stopped_event_with_breakpoint_id() {
        let json = r#"{
            "event": {"replayId": 12},
            "sobject": {
                "Type": "Stopped",
                "SessionId": "07aFAKESESSION",
                "RequestId": "07nFAKEREQUEST",
                "BreakpointId": "07bFAKEBREAK",
                "Line": 42
            }
        }"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sobject.event_type, DebuggerEventType::Stopped);
        assert_eq!(msg.sobject.breakpoint_id.as_deref(), Some("07bFAKEBREAK"));
        assert_eq!(msg.sobject.line, Some(42));
    }
}
