//! The debug adapter state machine
//!
//! One `DebugAdapter` per editor debug session. It owns every service of the
//! bridge and serializes all activity through a single select loop: client
//! requests from the stdio reader task on one channel, streaming notices on
//! the other. Nothing else mutates adapter state, so request handling and
//! event dispatch never race.

mod events;
mod requests;

use crate::breakpoints::BreakpointService;
use crate::constants::*;
use crate::protocol::{Request, Response};
use crate::session::SessionService;
use crate::threads::ThreadRegistry;
use crate::transport::MessageWriter;
use crate::variables::VariableState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tether_commands::{RecordClient, RequestService};
use tether_config::{WorkspaceSettings, DEFAULT_INITIALIZE_TIMEOUT_MS};
use tether_core::{Error, LineBreakpointInfo, RemoteErrorDetail, Result};
use tether_streaming::{StreamingNotice, StreamingService};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Launch and disconnect complete within a single handler turn, so there
/// are no in-between states. A failed launch drops back to `Initialized`,
/// not `Uninitialized`: capabilities stay negotiated and the client can
/// retry the launch directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// No capabilities negotiated yet; initialize may be pending on the
    /// source-location index.
    Uninitialized,
    /// Capabilities sent, index installed, no session in the org.
    Initialized,
    /// Session record exists, streaming is live.
    Running,
    /// Conversation over; the run loop exits.
    Terminated,
}

pub struct DebugAdapter<W> {
    writer: MessageWriter<W>,
    state: AdapterState,
    record_client: Arc<dyn RecordClient>,
    settings: WorkspaceSettings,

    /// Source-location index received before launch creates the service.
    source_index: Option<Vec<LineBreakpointInfo>>,
    /// Initialize request waiting for the index, with its deadline.
    pending_initialize: Option<Request>,
    initialize_deadline: Option<Instant>,

    session: Option<SessionService>,
    breakpoints: Option<BreakpointService>,
    requests: Option<RequestService>,
    streaming: Option<StreamingService>,

    threads: ThreadRegistry,
    variables: VariableState,
    /// Last stop reason per thread, used when a stop must be re-announced.
    stop_reasons: HashMap<i64, String>,

    notice_tx: mpsc::Sender<StreamingNotice>,
    notice_rx: mpsc::Receiver<StreamingNotice>,
}

impl<W> DebugAdapter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W, record_client: Arc<dyn RecordClient>) -> Self {
        let (notice_tx, notice_rx) = mpsc::channel(64);
        Self {
            writer: MessageWriter::new(writer),
            state: AdapterState::Uninitialized,
            record_client,
            settings: WorkspaceSettings::default(),
            source_index: None,
            pending_initialize: None,
            initialize_deadline: None,
            session: None,
            breakpoints: None,
            requests: None,
            streaming: None,
            threads: ThreadRegistry::new(),
            variables: VariableState::new(),
            stop_reasons: HashMap::new(),
            notice_tx,
            notice_rx,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// Drive the adapter until the client disconnects or closes the stream.
    pub async fn run(&mut self, mut requests: mpsc::Receiver<Request>) -> Result<()> {
        loop {
            if self.state == AdapterState::Terminated {
                break;
            }
            let deadline = self
                .initialize_deadline
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await?,
                    None => {
                        debug!("client stream closed");
                        self.shutdown().await;
                        break;
                    }
                },
                notice = self.notice_rx.recv() => {
                    if let Some(notice) = notice {
                        self.handle_notice(notice).await?;
                    }
                },
                _ = tokio::time::sleep_until(deadline), if self.initialize_deadline.is_some() => {
                    self.expire_initialize().await?;
                }
            }
        }
        info!("adapter stopped");
        Ok(())
    }

    /// Best-effort teardown when the client goes away without a disconnect
    /// request.
    async fn shutdown(&mut self) {
        if let Some(streaming) = &mut self.streaming {
            streaming.disconnect().await;
        }
        if let Some(session) = &mut self.session {
            if session.is_connected() {
                let _ = session.stop().await;
            }
        }
        self.state = AdapterState::Terminated;
    }

    // ------------------------------------------------------------------
    // response and event helpers
    // ------------------------------------------------------------------

    async fn respond_ok(&mut self, request: &Request) -> Result<()> {
        self.writer
            .send_response(Response::success(0, request.seq, &request.command))
            .await
    }

    async fn respond_ok_with(
        &mut self,
        request: &Request,
        body: serde_json::Value,
    ) -> Result<()> {
        self.writer
            .send_response(Response::success(0, request.seq, &request.command).with_body(body))
            .await
    }

    async fn respond_fail(&mut self, request: &Request, message: impl Into<String>) -> Result<()> {
        self.writer
            .send_response(Response::error(0, request.seq, &request.command, message))
            .await
    }

    /// Fail a request with a remote or CLI error: the structured `message`
    /// becomes the response message, `action` goes to the debug console,
    /// unparsable bodies pass through verbatim.
    async fn respond_command_error(&mut self, request: &Request, err: &Error) -> Result<()> {
        let (message, action) = error_parts(err);
        if let Some(action) = action {
            self.output_console(&action).await?;
        }
        self.respond_fail(request, message).await
    }

    async fn output_console(&mut self, text: &str) -> Result<()> {
        let body = crate::protocol::OutputEventBody::console(format!("{text}\n"));
        self.writer
            .send_event(EVENT_OUTPUT, Some(serde_json::to_value(body)?))
            .await
    }

    async fn output_stderr(&mut self, text: &str) -> Result<()> {
        let body = crate::protocol::OutputEventBody::stderr(format!("{text}\n"));
        self.writer
            .send_event(EVENT_OUTPUT, Some(serde_json::to_value(body)?))
            .await
    }

    async fn show_message(&mut self, message_type: &str, message: &str) -> Result<()> {
        let body = crate::protocol::ShowMessageEventBody {
            message_type: message_type.to_string(),
            message: message.to_string(),
        };
        self.writer
            .send_event(EVENT_SHOW_MESSAGE, Some(serde_json::to_value(body)?))
            .await
    }

    fn current_session_id(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|s| s.session_id())
            .map(str::to_string)
    }

    fn initialize_timeout(&self) -> Duration {
        Duration::from_millis(DEFAULT_INITIALIZE_TIMEOUT_MS)
    }
}

/// Split an error into the user-facing message and the optional remediation
/// action the remote service attached.
fn error_parts(err: &Error) -> (String, Option<String>) {
    match err {
        Error::Remote(raw) | Error::Cli(raw) => match RemoteErrorDetail::parse(raw) {
            Some(detail) => (detail.message, detail.action),
            None => (raw.clone(), None),
        },
        other => (other.to_string(), None),
    }
}

/// The index keys sources by uri while DAP sources carry paths.
pub(crate) fn path_to_uri(path: &str) -> String {
    if path.starts_with("file://") {
        path.to_string()
    } else {
        format!("file://{path}")
    }
}

pub(crate) fn uri_to_path(uri: &str) -> String {
    uri.strip_prefix("file://").unwrap_or(uri).to_string()
}
