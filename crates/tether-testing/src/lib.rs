//! Test doubles and fixtures shared by the Tether crates
//!
//! The heart of this crate is [`MockRecordClient`], a scripted stand-in for
//! the org CLI: tests queue results and afterwards inspect the exact record
//! calls a service made, which is how reconciliation behavior (diff instead
//! of clear-and-recreate) gets asserted.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tether_commands::RecordClient;
use tether_config::{BREAKPOINT_ID_PREFIX, SESSION_ID_PREFIX, SESSION_RECORD_TYPE};
use tether_core::{ConnectionInfo, Error, Result};

/// One recorded call against the mock, in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCall {
    Create {
        record_type: String,
        values: Vec<(String, String)>,
    },
    Update {
        record_type: String,
        record_id: String,
        values: Vec<(String, String)>,
    },
    Delete {
        record_type: String,
        record_id: String,
    },
    ConnectionInfo,
}

#[derive(Default)]
struct MockState {
    create_results: VecDeque<Result<String>>,
    update_results: VecDeque<Result<String>>,
    delete_results: VecDeque<Result<()>>,
    connection: Option<Result<ConnectionInfo>>,
    calls: Vec<RecordCall>,
    generated: u32,
}

/// Scripted [`RecordClient`] double.
///
/// Unqueued calls succeed: creates return a fresh id with the right prefix
/// for the record type, updates and deletes return unit. Queue explicit
/// results to exercise failure paths.
#[derive(Default)]
pub struct MockRecordClient {
    state: Mutex<MockState>,
}

impl MockRecordClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_create(&self, result: Result<String>) {
        self.state
            .lock()
            .expect("mock state lock")
            .create_results
            .push_back(result);
    }

    pub fn queue_update(&self, result: Result<String>) {
        self.state
            .lock()
            .expect("mock state lock")
            .update_results
            .push_back(result);
    }

    pub fn queue_delete(&self, result: Result<()>) {
        self.state
            .lock()
            .expect("mock state lock")
            .delete_results
            .push_back(result);
    }

    pub fn set_connection(&self, result: Result<ConnectionInfo>) {
        self.state.lock().expect("mock state lock").connection = Some(result);
    }

    pub fn calls(&self) -> Vec<RecordCall> {
        self.state.lock().expect("mock state lock").calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, RecordCall::Create { .. }))
    }

    pub fn update_count(&self) -> usize {
        self.count(|c| matches!(c, RecordCall::Update { .. }))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, RecordCall::Delete { .. }))
    }

    fn count(&self, matcher: impl Fn(&RecordCall) -> bool) -> usize {
        self.state
            .lock()
            .expect("mock state lock")
            .calls
            .iter()
            .filter(|c| matcher(c))
            .count()
    }
}

fn owned_values(values: &[(&str, &str)]) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[async_trait]
impl RecordClient for MockRecordClient {
    async fn create_record(
        &self,
        _project: &Path,
        record_type: &str,
        values: &[(&str, &str)],
    ) -> Result<String> {
        let mut state = self.state.lock().expect("mock state lock");
        state.calls.push(RecordCall::Create {
            record_type: record_type.to_string(),
            values: owned_values(values),
        });
        if let Some(result) = state.create_results.pop_front() {
            return result;
        }
        state.generated += 1;
        let prefix = if record_type == SESSION_RECORD_TYPE {
            SESSION_ID_PREFIX
        } else {
            BREAKPOINT_ID_PREFIX
        };
        Ok(format!("{}MOCK{:07}", prefix, state.generated))
    }

    async fn update_record(
        &self,
        _project: &Path,
        record_type: &str,
        record_id: &str,
        values: &[(&str, &str)],
    ) -> Result<String> {
        let mut state = self.state.lock().expect("mock state lock");
        state.calls.push(RecordCall::Update {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            values: owned_values(values),
        });
        state
            .update_results
            .pop_front()
            .unwrap_or_else(|| Ok(record_id.to_string()))
    }

    async fn delete_record(
        &self,
        _project: &Path,
        record_type: &str,
        record_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("mock state lock");
        state.calls.push(RecordCall::Delete {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
        });
        state.delete_results.pop_front().unwrap_or(Ok(()))
    }

    async fn connection_info(&self, _project: &Path) -> Result<ConnectionInfo> {
        let mut state = self.state.lock().expect("mock state lock");
        state.calls.push(RecordCall::ConnectionInfo);
        match &state.connection {
            Some(Ok(info)) => Ok(info.clone()),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(ConnectionInfo {
                instance_url: "https://mock.example.com".to_string(),
                access_token: "00D!mock".to_string(),
            }),
        }
    }
}

/// A CLI-style failure body, handy for scripting error paths.
pub fn cli_failure(message: &str) -> Error {
    Error::Cli(format!(r#"{{"status":1,"message":"{message}"}}"#))
}

/// Source-location index fixture: two typerefs, one of them sharing a file.
pub fn sample_line_index() -> Vec<tether_core::LineBreakpointInfo> {
    vec![
        tether_core::LineBreakpointInfo {
            uri: "file:///work/demo/classes/Foo.cls".to_string(),
            typeref: "Foo".to_string(),
            lines: vec![3, 4, 7, 12],
        },
        tether_core::LineBreakpointInfo {
            uri: "file:///work/demo/classes/Foo.cls".to_string(),
            typeref: "Foo$Inner".to_string(),
            lines: vec![21, 22],
        },
        tether_core::LineBreakpointInfo {
            uri: "file:///work/demo/classes/Bar.cls".to_string(),
            typeref: "Bar".to_string(),
            lines: vec![5, 9],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unqueued_create_generates_prefixed_ids() {
        let mock = MockRecordClient::new();
        let session = mock
            .create_record(Path::new("/p"), SESSION_RECORD_TYPE, &[])
            .await
            .unwrap();
        let breakpoint = mock
            .create_record(Path::new("/p"), "DebuggerBreakpoint", &[])
            .await
            .unwrap();
        assert!(session.starts_with(SESSION_ID_PREFIX));
        assert!(breakpoint.starts_with(BREAKPOINT_ID_PREFIX));
        assert_ne!(session, breakpoint);
    }

    #[tokio::test]
    async fn test_queued_results_are_consumed_in_order() {
        let mock = MockRecordClient::new();
        mock.queue_create(Err(cli_failure("boom")));
        mock.queue_create(Ok("07bEXPLICIT".to_string()));

        assert!(mock
            .create_record(Path::new("/p"), "DebuggerBreakpoint", &[])
            .await
            .is_err());
        assert_eq!(
            mock.create_record(Path::new("/p"), "DebuggerBreakpoint", &[])
                .await
                .unwrap(),
            "07bEXPLICIT"
        );
        assert_eq!(mock.create_count(), 2);
    }
}
