//! Error types shared across the Tether crates

use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Error body returned by the remote debugger API, propagated verbatim.
    ///
    /// The body is often (but not always) structured JSON `{message, action}`;
    /// callers that want to show a friendly message should run it through
    /// [`RemoteErrorDetail::parse`].
    #[error("{0}")]
    Remote(String),

    /// Output of a failed org CLI invocation, propagated verbatim.
    #[error("{0}")]
    Cli(String),

    /// Transport failures: socket errors, channel send failures, dropped
    /// long-poll connections.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Request timed out at the HTTP layer.
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Protocol state violations and local usage errors (bad thread id,
    /// source index not installed, launch before initialize).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON parsing and deserialization failures.
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidMessage(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Communication(err.to_string())
    }
}

/// Structured error detail as returned by the remote debugger API.
///
/// `message` is meant for the user; `action` is remediation guidance that is
/// logged to the debug console but never merged into the message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteErrorDetail {
    pub message: String,
    #[serde(default)]
    pub action: Option<String>,
}

impl RemoteErrorDetail {
    /// Try to parse a raw error body into its structured form.
    ///
    /// Returns `None` for unparsable bodies, which callers must then surface
    /// verbatim.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<Self>(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_detail_parses_message_and_action() {
        let raw = r#"{"message":"Session limit reached","action":"Close another session"}"#;
        let detail = RemoteErrorDetail::parse(raw).unwrap();
        assert_eq!(detail.message, "Session limit reached");
        assert_eq!(detail.action.as_deref(), Some("Close another session"));
    }

    #[test]
    fn test_remote_error_detail_unparsable_body() {
        assert!(RemoteErrorDetail::parse("500 Internal Server Error").is_none());
    }

    #[test]
    fn test_remote_error_display_is_verbatim() {
        let err = Error::Remote("raw body".to_string());
        assert_eq!(err.to_string(), "raw body");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        match Error::from(json_err) {
            Error::InvalidMessage(_) => {}
            other => panic!("expected InvalidMessage, got {other:?}"),
        }
    }
}
