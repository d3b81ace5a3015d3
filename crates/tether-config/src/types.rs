//! Configuration types for the Tether bridge

use crate::constants::{DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_ORG_CLI, ENV_ORG_CLI};
use serde::{Deserialize, Serialize};

/// Workspace-level settings pushed by the editor shell before launch.
///
/// Everything here tunes the HTTP command layer: proxy traversal and the
/// per-command timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceSettings {
    pub proxy_url: Option<String>,
    pub proxy_strict_ssl: bool,
    pub proxy_auth: Option<String>,
    pub connection_timeout_ms: u64,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            proxy_url: None,
            proxy_strict_ssl: true,
            proxy_auth: None,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
        }
    }
}

/// Org CLI invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgCliConfig {
    /// Executable name or path of the org CLI.
    pub binary: String,
}

impl Default for OrgCliConfig {
    fn default() -> Self {
        let binary =
            std::env::var(ENV_ORG_CLI).unwrap_or_else(|_| DEFAULT_ORG_CLI.to_string());
        Self { binary }
    }
}
