//! Centralized logging configuration for Tether
//!
//! Wraps `tracing` and `tracing-subscriber` so every binary initializes
//! logging the same way. The DAP adapter speaks its protocol over stdout, so
//! logs always go to stderr or a file - never stdout.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tether_logging::{init, LogConfig};
//!
//! // Adapter mode: logs to stderr
//! init(LogConfig::new().debug(args.debug));
//!
//! // File logging; the guard must be held until exit
//! let _guard = init_with_file(LogConfig::new(), Path::new("tether-dap.log"))?;
//! ```

use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for standardized imports
pub use tracing::{debug, error, info, span, trace, warn, Level};

// Re-export WorkerGuard for file logging lifetime management
pub use tracing_appender::non_blocking::WorkerGuard;

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable debug-level logging (overrides default_level)
    pub debug: bool,
    /// Default log level when RUST_LOG is not set
    pub default_level: String,
    /// Show module target in log output
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            default_level: "info".to_string(),
            show_target: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
        }
    }
}

/// Initialize logging to stderr.
///
/// # Environment Variables
///
/// - `RUST_LOG`: overrides the log level (e.g. `RUST_LOG=tether_streaming=trace`)
///
/// # Panics
///
/// Panics if called more than once (tracing can only be initialized once).
pub fn init(config: LogConfig) {
    let is_tty = std::io::stderr().is_terminal();
    fmt()
        .with_env_filter(config.build_filter())
        .with_target(config.show_target)
        .with_writer(std::io::stderr)
        .with_ansi(is_tty)
        .init();
}

/// Initialize non-blocking file logging.
///
/// The returned [`WorkerGuard`] must be held until program exit so remaining
/// logs are flushed.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_with_file(config: LogConfig, log_path: &Path) -> std::io::Result<WorkerGuard> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    fmt()
        .with_env_filter(config.build_filter())
        .with_target(config.show_target)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}

/// Initialize logging for tests.
///
/// Uses `with_test_writer()` to capture logs in test output.
/// Safe to call multiple times (uses `try_init` internally).
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}
