//! Debugger session lifecycle
//!
//! A session is a record in the org. Creating it makes the remote debugger
//! start trapping matching requests, so it must only happen after streaming
//! subscriptions are live; detaching it releases everything server side.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_commands::RecordClient;
use tether_config::{SESSION_DETACH_STATUS, SESSION_ID_PREFIX, SESSION_RECORD_TYPE};
use tether_core::{Error, Result};
use tracing::{info, warn};

/// Request filters of a session, taken from the launch arguments. Empty
/// filters trap every request of the org's users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilters {
    pub user_ids: Vec<String>,
    pub request_types: Vec<String>,
    pub entry_points: Option<String>,
}

pub struct SessionService {
    client: Arc<dyn RecordClient>,
    project: PathBuf,
    session_id: Option<String>,
}

impl SessionService {
    pub fn new(client: Arc<dyn RecordClient>, project: &Path) -> Self {
        Self {
            client,
            project: project.to_path_buf(),
            session_id: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether an event's session id refers to this session. Events for
    /// other sessions in the same org arrive on the shared topics and must
    /// be ignored.
    pub fn is_current(&self, session_id: &str) -> bool {
        self.session_id.as_deref() == Some(session_id)
    }

    /// Create the session record and remember its id.
    ///
    /// The CLI answer is only trusted when the returned id carries the
    /// session record type prefix; anything else fails the launch.
    pub async fn start(&mut self, filters: &SessionFilters) -> Result<String> {
        let user_filter = filters.user_ids.join(",");
        let request_filter = filters.request_types.join(",");
        let entry_filter = filters.entry_points.clone().unwrap_or_default();
        let values = [
            ("UserIdFilter", user_filter.as_str()),
            ("RequestTypeFilter", request_filter.as_str()),
            ("EntryPointFilter", entry_filter.as_str()),
        ];
        let id = self
            .client
            .create_record(&self.project, SESSION_RECORD_TYPE, &values)
            .await?;
        if !id.starts_with(SESSION_ID_PREFIX) {
            return Err(Error::Protocol(format!(
                "org CLI returned an unexpected session id: {id}"
            )));
        }
        info!(session_id = %id, "debugger session started");
        self.session_id = Some(id.clone());
        Ok(id)
    }

    /// Detach the session in the org. The session is only cleared when the
    /// CLI acknowledges the detach with the same id; a mismatch or failure
    /// leaves the state untouched so a later attempt can retry. Succeeds as
    /// a no-op when no session is active.
    pub async fn stop(&mut self) -> Result<String> {
        let Some(id) = self.session_id.clone() else {
            return Ok(String::new());
        };
        let result = self
            .client
            .update_record(
                &self.project,
                SESSION_RECORD_TYPE,
                &id,
                &[("Status", SESSION_DETACH_STATUS)],
            )
            .await;
        match result {
            Ok(acknowledged) if acknowledged == id => {
                info!(session_id = %id, "debugger session detached");
                self.session_id = None;
                Ok(id)
            }
            Ok(acknowledged) => {
                warn!(session_id = %id, %acknowledged, "detach acknowledged a different record");
                Err(Error::Protocol(format!(
                    "org CLI detached an unexpected session: {acknowledged}"
                )))
            }
            Err(err) => {
                warn!(session_id = %id, %err, "session detach failed");
                Err(err)
            }
        }
    }

    /// Forget the session without touching the org. Used when the org itself
    /// reports the session terminated.
    pub fn force_stop(&mut self) {
        if let Some(id) = self.session_id.take() {
            info!(session_id = %id, "debugger session closed locally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_testing::{MockRecordClient, RecordCall};

    fn filters() -> SessionFilters {
        SessionFilters {
            user_ids: vec!["005xx1".to_string(), "005xx2".to_string()],
            request_types: vec!["RUN_TESTS".to_string()],
            entry_points: Some(".*test.*".to_string()),
        }
    }

    #[tokio::test]
    async fn test_start_records_filters_and_session_id() {
        let client = Arc::new(MockRecordClient::new());
        client.queue_create(Ok("07aFAKESESSION".to_string()));
        let mut service = SessionService::new(client.clone(), Path::new("/work/demo"));

        let id = service.start(&filters()).await.unwrap();
        assert_eq!(id, "07aFAKESESSION");
        assert!(service.is_connected());
        assert!(service.is_current("07aFAKESESSION"));

        match &client.calls()[0] {
            RecordCall::Create {
                record_type,
                values,
            } => {
                assert_eq!(record_type, SESSION_RECORD_TYPE);
                assert!(values
                    .iter()
                    .any(|(k, v)| k == "UserIdFilter" && v == "005xx1,005xx2"));
                assert!(values
                    .iter()
                    .any(|(k, v)| k == "RequestTypeFilter" && v == "RUN_TESTS"));
            }
            other => panic!("expected create call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_rejects_foreign_id_prefix() {
        let client = Arc::new(MockRecordClient::new());
        client.queue_create(Ok("001NOTASESSION".to_string()));
        let mut service = SessionService::new(client, Path::new("/work/demo"));

        let err = service.start(&SessionFilters::default()).await.unwrap_err();
        match err {
            Error::Protocol(msg) => assert!(msg.contains("001NOTASESSION")),
            other => panic!("expected Protocol error, got {other:?}"),
        }
        assert!(!service.is_connected());
    }

    #[tokio::test]
    async fn test_stop_detaches_and_clears() {
        let client = Arc::new(MockRecordClient::new());
        client.queue_create(Ok("07aFAKESESSION".to_string()));
        let mut service = SessionService::new(client.clone(), Path::new("/work/demo"));
        service.start(&SessionFilters::default()).await.unwrap();

        let stopped = service.stop().await.unwrap();
        assert_eq!(stopped, "07aFAKESESSION");
        assert!(!service.is_connected());
        match &client.calls()[1] {
            RecordCall::Update {
                record_id, values, ..
            } => {
                assert_eq!(record_id, "07aFAKESESSION");
                assert_eq!(values[0], ("Status".to_string(), "Detach".to_string()));
            }
            other => panic!("expected update call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stop_without_session_is_noop() {
        let client = Arc::new(MockRecordClient::new());
        let mut service = SessionService::new(client.clone(), Path::new("/work/demo"));
        service.stop().await.unwrap();
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_failure_keeps_session() {
        let client = Arc::new(MockRecordClient::new());
        client.queue_create(Ok("07aFAKESESSION".to_string()));
        let mut service = SessionService::new(client.clone(), Path::new("/work/demo"));
        service.start(&SessionFilters::default()).await.unwrap();

        client.queue_update(Err(tether_testing::cli_failure("org unreachable")));
        assert!(service.stop().await.is_err());
        assert!(service.is_connected());
    }

    #[tokio::test]
    async fn test_stop_with_mismatched_id_keeps_session() {
        let client = Arc::new(MockRecordClient::new());
        client.queue_create(Ok("07aFAKESESSION".to_string()));
        let mut service = SessionService::new(client.clone(), Path::new("/work/demo"));
        service.start(&SessionFilters::default()).await.unwrap();

        client.queue_update(Ok("FAKEWRONGID".to_string()));
        let err = service.stop().await.unwrap_err();
        match err {
            Error::Protocol(msg) => assert!(msg.contains("FAKEWRONGID")),
            other => panic!("expected Protocol error, got {other:?}"),
        }
        assert!(service.is_connected());
        assert!(service.is_current("07aFAKESESSION"));
    }

    #[tokio::test]
    async fn test_force_stop_skips_the_org() {
        let client = Arc::new(MockRecordClient::new());
        client.queue_create(Ok("07aFAKESESSION".to_string()));
        let mut service = SessionService::new(client.clone(), Path::new("/work/demo"));
        service.start(&SessionFilters::default()).await.unwrap();

        service.force_stop();
        assert!(!service.is_connected());
        assert_eq!(client.calls().len(), 1);
    }
}
