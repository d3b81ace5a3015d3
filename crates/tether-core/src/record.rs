//! Structured JSON results of the org CLI
//!
//! Debugger session and breakpoint records are created, updated and deleted
//! through the org command-line tool; the bridge only consumes its `--json`
//! output.

use serde::{Deserialize, Serialize};

/// Top-level shape of every `--json` CLI result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CliResponse<T> {
    pub status: i32,
    pub result: T,
}

/// Result of a record create/update/delete invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordResult {
    pub id: String,
    #[serde(default)]
    pub success: bool,
}

/// Org connection info resolved through the CLI; everything the HTTP command
/// layer needs to reach the remote debugger API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub instance_url: String,
    pub access_token: String,
}
