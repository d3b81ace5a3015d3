//! Org record operations through the org CLI
//!
//! Session and breakpoint records live in the org, not behind the debugger
//! API. They are created, updated and deleted by shelling out to the org CLI
//! with `--json` output. The trait seam lets tests substitute a counting
//! double for the real binary.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tether_config::OrgCliConfig;
use tether_core::{CliResponse, ConnectionInfo, Error, RecordResult, Result};
use tokio::process::Command;
use tracing::debug;

/// Record operations against the org.
///
/// Every method takes the project directory so the CLI resolves the default
/// org of that workspace.
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// Create a record of `record_type` with the given field values and
    /// return its id.
    async fn create_record(
        &self,
        project: &Path,
        record_type: &str,
        values: &[(&str, &str)],
    ) -> Result<String>;

    /// Update one field set on an existing record. Returns the id the CLI
    /// acknowledged, which callers must check against the id they addressed.
    async fn update_record(
        &self,
        project: &Path,
        record_type: &str,
        record_id: &str,
        values: &[(&str, &str)],
    ) -> Result<String>;

    /// Delete a record by id.
    async fn delete_record(&self, project: &Path, record_type: &str, record_id: &str)
        -> Result<()>;

    /// Resolve the instance URL and access token of the project's default org.
    async fn connection_info(&self, project: &Path) -> Result<ConnectionInfo>;
}

/// [`RecordClient`] backed by the real org CLI binary.
pub struct CliRecordClient {
    binary: PathBuf,
}

impl CliRecordClient {
    pub fn new(config: &OrgCliConfig) -> Self {
        Self {
            binary: PathBuf::from(&config.binary),
        }
    }

    async fn run(&self, project: &Path, args: &[String]) -> Result<String> {
        debug!(binary = %self.binary.display(), ?args, "invoking org CLI");
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(project)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::Cli(format!(
                    "Failed to run {}: {e}",
                    self.binary.display()
                ))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else if stdout.trim().is_empty() {
            Err(Error::Cli(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        } else {
            // failures still print a --json body on stdout
            Err(Error::Cli(stdout))
        }
    }

    fn values_arg(values: &[(&str, &str)]) -> String {
        values
            .iter()
            .map(|(key, value)| format!("{key}='{value}'"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl RecordClient for CliRecordClient {
    async fn create_record(
        &self,
        project: &Path,
        record_type: &str,
        values: &[(&str, &str)],
    ) -> Result<String> {
        let args = vec![
            "data:record:create".to_string(),
            "--type".to_string(),
            record_type.to_string(),
            "--values".to_string(),
            Self::values_arg(values),
            "--use-tooling-api".to_string(),
            "--json".to_string(),
        ];
        let raw = self.run(project, &args).await?;
        let response: CliResponse<RecordResult> =
            serde_json::from_str(&raw).map_err(|_| Error::Cli(raw.clone()))?;
        if response.status == 0 && response.result.success {
            Ok(response.result.id)
        } else {
            Err(Error::Cli(raw))
        }
    }

    async fn update_record(
        &self,
        project: &Path,
        record_type: &str,
        record_id: &str,
        values: &[(&str, &str)],
    ) -> Result<String> {
        let args = vec![
            "data:record:update".to_string(),
            "--type".to_string(),
            record_type.to_string(),
            "--record-id".to_string(),
            record_id.to_string(),
            "--values".to_string(),
            Self::values_arg(values),
            "--use-tooling-api".to_string(),
            "--json".to_string(),
        ];
        let raw = self.run(project, &args).await?;
        let response: CliResponse<RecordResult> =
            serde_json::from_str(&raw).map_err(|_| Error::Cli(raw.clone()))?;
        if response.status == 0 && response.result.success {
            Ok(response.result.id)
        } else {
            Err(Error::Cli(raw))
        }
    }

    async fn delete_record(
        &self,
        project: &Path,
        record_type: &str,
        record_id: &str,
    ) -> Result<()> {
        let args = vec![
            "data:record:delete".to_string(),
            "--type".to_string(),
            record_type.to_string(),
            "--record-id".to_string(),
            record_id.to_string(),
            "--use-tooling-api".to_string(),
            "--json".to_string(),
        ];
        let raw = self.run(project, &args).await?;
        let response: CliResponse<RecordResult> =
            serde_json::from_str(&raw).map_err(|_| Error::Cli(raw.clone()))?;
        if response.status == 0 && response.result.success {
            Ok(())
        } else {
            Err(Error::Cli(raw))
        }
    }

    async fn connection_info(&self, project: &Path) -> Result<ConnectionInfo> {
        let args = vec!["org:display".to_string(), "--json".to_string()];
        let raw = self.run(project, &args).await?;
        let response: CliResponse<ConnectionInfo> =
            serde_json::from_str(&raw).map_err(|_| Error::Cli(raw.clone()))?;
        if response.status == 0 {
            Ok(response.result)
        } else {
            Err(Error::Cli(raw))
        }
    }
}
