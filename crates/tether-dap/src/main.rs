//! Tether DAP adapter binary
//!
//! Launched by the editor shell with the adapter's stdio wired to the DAP
//! conversation. Logs must never touch stdout; they go to stderr or, with
//! `--log-file`, to a file.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tether_commands::CliRecordClient;
use tether_config::OrgCliConfig;
use tether_dap::{spawn_reader, DebugAdapter};
use tether_logging::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "tether-dap", version, about = "DAP adapter for the Tether remote-debugging bridge")]
struct Args {
    /// Enable debug-level logging
    #[arg(long)]
    debug: bool,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_config = LogConfig::new().debug(args.debug);
    let _guard = match &args.log_file {
        Some(path) => Some(tether_logging::init_with_file(log_config, path)?),
        None => {
            tether_logging::init(log_config);
            None
        }
    };

    let record_client = CliRecordClient::new(&OrgCliConfig::default());
    let requests = spawn_reader(tokio::io::stdin());
    let mut adapter = DebugAdapter::new(tokio::io::stdout(), Arc::new(record_client));
    adapter.run(requests).await?;
    Ok(())
}
