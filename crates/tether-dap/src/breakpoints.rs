//! Breakpoint reconciliation
//!
//! The editor sends the complete desired set of breakpoints for one source
//! file on every change. The service diffs that set against what is already
//! installed in the org and issues only the necessary record deletes and
//! creates; recreating an unchanged breakpoint would drop hits that occur
//! in the window between delete and create.
//!
//! Line verification needs the source-location index pushed by the analysis
//! side: a line only maps to an org breakpoint when the index names the
//! typeref it compiles into.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_commands::RecordClient;
use tether_config::{
    BREAKPOINT_ID_PREFIX, BREAKPOINT_RECORD_TYPE, BREAKPOINT_TYPE_EXCEPTION, BREAKPOINT_TYPE_LINE,
    EXCEPTION_BREAK_MODE_ALWAYS, EXCEPTION_BREAK_MODE_NEVER,
};
use tether_core::{Error, LineBreakpointInfo, Result, TyperefLines};
use tracing::{debug, warn};

pub struct BreakpointService {
    client: Arc<dyn RecordClient>,
    project: PathBuf,
    /// uri -> typerefs declared in that file with their executable lines.
    line_index: HashMap<String, Vec<TyperefLines>>,
    /// typeref -> uri, for resolving streamed events back to sources.
    typeref_index: HashMap<String, String>,
    /// uri -> line -> installed breakpoint record id.
    line_cache: HashMap<String, HashMap<u32, String>>,
    /// exception typeref -> installed breakpoint record id.
    exception_cache: HashMap<String, String>,
}

impl BreakpointService {
    pub fn new(client: Arc<dyn RecordClient>, project: &Path) -> Self {
        Self {
            client,
            project: project.to_path_buf(),
            line_index: HashMap::new(),
            typeref_index: HashMap::new(),
            line_cache: HashMap::new(),
            exception_cache: HashMap::new(),
        }
    }

    /// Install the source-location index. Replaces any previous index.
    pub fn set_source_index(&mut self, infos: Vec<LineBreakpointInfo>) {
        self.line_index.clear();
        self.typeref_index.clear();
        for info in infos {
            self.typeref_index
                .insert(info.typeref.clone(), info.uri.clone());
            self.line_index
                .entry(info.uri)
                .or_default()
                .push(TyperefLines {
                    typeref: info.typeref,
                    lines: info.lines,
                });
        }
        debug!(
            sources = self.line_index.len(),
            typerefs = self.typeref_index.len(),
            "source-location index installed"
        );
    }

    pub fn has_source_index(&self) -> bool {
        !self.line_index.is_empty()
    }

    /// Typeref a line of a source compiles into, if the line is executable.
    pub fn typeref_for(&self, uri: &str, line: u32) -> Option<&str> {
        self.line_index.get(uri)?.iter().find_map(|entry| {
            entry
                .lines
                .contains(&line)
                .then_some(entry.typeref.as_str())
        })
    }

    /// Source uri a typeref was compiled from.
    pub fn source_path_for_typeref(&self, typeref: &str) -> Option<&str> {
        self.typeref_index.get(typeref).map(String::as_str)
    }

    /// Lines with an installed breakpoint record for one source.
    pub fn breakpoints_for(&self, uri: &str) -> BTreeSet<u32> {
        self.line_cache
            .get(uri)
            .map(|cache| cache.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Reconcile the desired breakpoint set of one source against the org.
    ///
    /// Returns the lines installed after the run: the requested lines that
    /// resolve to a typeref. Deletes of retired breakpoints are best effort;
    /// a failed delete keeps the cache entry so the surviving remote record
    /// is reused instead of duplicated. A failed create aborts the run and
    /// fails the client request.
    pub async fn reconcile_line_breakpoints(
        &mut self,
        session_id: &str,
        uri: &str,
        requested: &[u32],
    ) -> Result<BTreeSet<u32>> {
        let desired: BTreeSet<u32> = requested.iter().copied().collect();

        let cache = self.line_cache.entry(uri.to_string()).or_default();
        let retired: Vec<(u32, String)> = cache
            .iter()
            .filter(|(line, _)| !desired.contains(line))
            .map(|(line, record_id)| (*line, record_id.clone()))
            .collect();
        for (line, record_id) in retired {
            match self
                .client
                .delete_record(&self.project, BREAKPOINT_RECORD_TYPE, &record_id)
                .await
            {
                Ok(()) => {
                    cache.remove(&line);
                }
                Err(err) => {
                    warn!(%uri, line, %record_id, %err, "breakpoint delete failed, record kept");
                }
            }
        }

        let mut installed = BTreeSet::new();
        for line in desired {
            if self.line_cache[uri].contains_key(&line) {
                installed.insert(line);
                continue;
            }
            let Some(typeref) = self.typeref_for(uri, line) else {
                continue;
            };
            let typeref = typeref.to_string();
            let line_value = line.to_string();
            let values = [
                ("SessionId", session_id),
                ("TypeRef", typeref.as_str()),
                ("Line", line_value.as_str()),
                ("Type", BREAKPOINT_TYPE_LINE),
            ];
            let record_id = self
                .client
                .create_record(&self.project, BREAKPOINT_RECORD_TYPE, &values)
                .await?;
            if !record_id.starts_with(BREAKPOINT_ID_PREFIX) {
                return Err(Error::Protocol(format!(
                    "org CLI returned an unexpected breakpoint id: {record_id}"
                )));
            }
            self.line_cache
                .get_mut(uri)
                .expect("cache entry exists")
                .insert(line, record_id);
            installed.insert(line);
        }
        debug!(%uri, ?installed, "line breakpoints reconciled");
        Ok(installed)
    }

    /// Apply one exception break mode change. `always` installs a record,
    /// `never` removes it; any other mode is acknowledged without effect.
    pub async fn reconcile_exception_breakpoints(
        &mut self,
        session_id: &str,
        typeref: &str,
        break_mode: &str,
    ) -> Result<()> {
        match break_mode {
            EXCEPTION_BREAK_MODE_ALWAYS => {
                if self.exception_cache.contains_key(typeref) {
                    return Ok(());
                }
                let values = [
                    ("SessionId", session_id),
                    ("TypeRef", typeref),
                    ("Type", BREAKPOINT_TYPE_EXCEPTION),
                ];
                let record_id = self
                    .client
                    .create_record(&self.project, BREAKPOINT_RECORD_TYPE, &values)
                    .await?;
                if !record_id.starts_with(BREAKPOINT_ID_PREFIX) {
                    return Err(Error::Protocol(format!(
                        "org CLI returned an unexpected breakpoint id: {record_id}"
                    )));
                }
                debug!(%typeref, %record_id, "exception breakpoint installed");
                self.exception_cache.insert(typeref.to_string(), record_id);
                Ok(())
            }
            EXCEPTION_BREAK_MODE_NEVER => {
                if let Some(record_id) = self.exception_cache.remove(typeref) {
                    self.client
                        .delete_record(&self.project, BREAKPOINT_RECORD_TYPE, &record_id)
                        .await?;
                    debug!(%typeref, %record_id, "exception breakpoint removed");
                }
                Ok(())
            }
            other => {
                debug!(%typeref, mode = other, "unsupported exception break mode ignored");
                Ok(())
            }
        }
    }

    /// Typerefs whose break mode is currently `always`, ascending.
    pub fn exception_breakpoint_cache(&self) -> Vec<String> {
        let mut typerefs: Vec<String> = self.exception_cache.keys().cloned().collect();
        typerefs.sort();
        typerefs
    }

    /// Forget all installed breakpoints locally. Used on disconnect, where
    /// detaching the session already clears them in the org.
    pub fn clear(&mut self) {
        self.line_cache.clear();
        self.exception_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_testing::{cli_failure, sample_line_index, MockRecordClient, RecordCall};

    const URI: &str = "file:///work/demo/classes/Foo.cls";
    const SESSION: &str = "07aFAKESESSION";

    fn service_with_index() -> (Arc<MockRecordClient>, BreakpointService) {
        let client = Arc::new(MockRecordClient::new());
        let mut service = BreakpointService::new(client.clone(), Path::new("/work/demo"));
        service.set_source_index(sample_line_index());
        (client, service)
    }

    fn lines(set: &BTreeSet<u32>) -> Vec<u32> {
        set.iter().copied().collect()
    }

    #[test]
    fn test_typeref_lookup_spans_entries_of_one_file() {
        let (_, service) = service_with_index();
        assert_eq!(service.typeref_for(URI, 4), Some("Foo"));
        assert_eq!(service.typeref_for(URI, 21), Some("Foo$Inner"));
        assert_eq!(service.typeref_for(URI, 99), None);
        assert_eq!(service.typeref_for("file:///nowhere.cls", 4), None);
    }

    #[test]
    fn test_source_lookup_by_typeref() {
        let (_, service) = service_with_index();
        assert_eq!(service.source_path_for_typeref("Foo$Inner"), Some(URI));
        assert_eq!(service.source_path_for_typeref("Missing"), None);
    }

    #[tokio::test]
    async fn test_reconcile_creates_only_executable_lines() {
        let (client, mut service) = service_with_index();
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 5, 21])
            .await
            .unwrap();
        // line 5 is not executable in Foo.cls
        assert_eq!(lines(&installed), vec![3, 21]);
        assert_eq!(client.create_count(), 2);
        assert_eq!(client.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_is_a_diff_not_a_rebuild() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 4])
            .await
            .unwrap();
        assert_eq!(client.create_count(), 2);

        // 3 stays, 4 goes, 7 arrives
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 7])
            .await
            .unwrap();
        assert_eq!(lines(&installed), vec![3, 7]);
        assert_eq!(client.create_count(), 3);
        assert_eq!(client.delete_count(), 1);
        match &client.calls().last().unwrap() {
            RecordCall::Create { values, .. } => {
                assert!(values.iter().any(|(k, v)| k == "Line" && v == "7"));
                assert!(values.iter().any(|(k, v)| k == "SessionId" && v == SESSION));
            }
            other => panic!("expected create call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reconcile_same_set_twice_is_idempotent() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 4])
            .await
            .unwrap();
        let calls_after_first = client.calls().len();

        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[4, 3])
            .await
            .unwrap();
        assert_eq!(lines(&installed), vec![3, 4]);
        assert_eq!(client.calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_reconcile_empty_set_deletes_everything() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 4])
            .await
            .unwrap();
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[])
            .await
            .unwrap();
        assert!(installed.is_empty());
        assert_eq!(client.delete_count(), 2);
        assert!(service.breakpoints_for(URI).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_requested_lines_create_one_record() {
        let (client, mut service) = service_with_index();
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 3, 3])
            .await
            .unwrap();
        assert_eq!(lines(&installed), vec![3]);
        assert_eq!(client.create_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_propagates_and_keeps_cache_consistent() {
        let (client, mut service) = service_with_index();
        client.queue_create(Err(cli_failure("limit exceeded")));
        let err = service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 4])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cli(_)));
        // only the failed line is missing; retrying installs it
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[3, 4])
            .await
            .unwrap();
        assert_eq!(lines(&installed), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_fail_the_run() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_line_breakpoints(SESSION, URI, &[3])
            .await
            .unwrap();
        client.queue_delete(Err(cli_failure("org unreachable")));
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[4])
            .await
            .unwrap();
        assert_eq!(lines(&installed), vec![4]);
        // the remote record survived the failed delete, so it stays cached
        assert!(service.breakpoints_for(URI).contains(&3));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_record_and_avoids_duplicate_create() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_line_breakpoints(SESSION, URI, &[3])
            .await
            .unwrap();
        client.queue_delete(Err(cli_failure("org unreachable")));
        service
            .reconcile_line_breakpoints(SESSION, URI, &[])
            .await
            .unwrap();

        // re-requesting the line reuses the cached record
        let installed = service
            .reconcile_line_breakpoints(SESSION, URI, &[3])
            .await
            .unwrap();
        assert_eq!(lines(&installed), vec![3]);
        assert_eq!(client.create_count(), 1);

        // the retry of the delete succeeds and finally drops the cache entry
        service
            .reconcile_line_breakpoints(SESSION, URI, &[])
            .await
            .unwrap();
        assert_eq!(client.delete_count(), 2);
        assert!(service.breakpoints_for(URI).is_empty());
    }

    #[tokio::test]
    async fn test_exception_always_then_never_round_trip() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_exception_breakpoints(SESSION, "System.NullPointerException", "always")
            .await
            .unwrap();
        assert_eq!(
            service.exception_breakpoint_cache(),
            vec!["System.NullPointerException".to_string()]
        );
        // repeating always is a no-op
        service
            .reconcile_exception_breakpoints(SESSION, "System.NullPointerException", "always")
            .await
            .unwrap();
        assert_eq!(client.create_count(), 1);

        service
            .reconcile_exception_breakpoints(SESSION, "System.NullPointerException", "never")
            .await
            .unwrap();
        assert!(service.exception_breakpoint_cache().is_empty());
        assert_eq!(client.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_break_mode_is_ignored() {
        let (client, mut service) = service_with_index();
        service
            .reconcile_exception_breakpoints(SESSION, "System.DmlException", "unhandled")
            .await
            .unwrap();
        assert!(client.calls().is_empty());
        assert!(service.exception_breakpoint_cache().is_empty());
    }
}
