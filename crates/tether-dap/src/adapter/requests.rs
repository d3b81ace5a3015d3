//! Client request handling
//!
//! One handler per DAP command plus the custom requests of the editor shell.
//! Handlers fail the individual response on error; only transport failures
//! towards the client propagate out of the run loop.

use super::{path_to_uri, uri_to_path, AdapterState, DebugAdapter};
use crate::breakpoints::BreakpointService;
use crate::constants::*;
use crate::protocol::*;
use crate::session::{SessionFilters, SessionService};
use crate::variables::{FrameInfo, ScopeKind, VariableContainer};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tether_commands::{
    responses, DebuggerResponse, FrameCommand, ReferencesCommand, RequestService, RunCommand,
    StateCommand, StepCommand, StepKind,
};
use tether_config::WorkspaceSettings;
use tether_core::{LineBreakpointInfo, Result};
use tether_streaming::StreamingService;
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tracing::{debug, warn};

fn parse_arguments<T: DeserializeOwned>(request: &Request) -> std::result::Result<T, String> {
    let arguments = request.arguments.clone().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(arguments)
        .map_err(|e| format!("Invalid arguments for {}: {e}", request.command))
}

impl<W> DebugAdapter<W>
where
    W: AsyncWrite + Unpin,
{
    pub(super) async fn handle_request(&mut self, request: Request) -> Result<()> {
        debug!(command = %request.command, seq = request.seq, "handling request");
        match request.command.as_str() {
            REQUEST_INITIALIZE => self.handle_initialize(request).await,
            REQUEST_LAUNCH => self.handle_launch(request).await,
            REQUEST_CONFIGURATION_DONE => self.respond_ok(&request).await,
            REQUEST_DISCONNECT => self.handle_disconnect(request).await,
            REQUEST_SET_BREAKPOINTS => self.handle_set_breakpoints(request).await,
            REQUEST_SET_EXCEPTION_BREAKPOINTS => {
                self.handle_set_exception_breakpoints(request).await
            }
            REQUEST_CONTINUE => self.handle_continue(request).await,
            REQUEST_NEXT => self.handle_step(request, StepKind::Over).await,
            REQUEST_STEP_IN => self.handle_step(request, StepKind::Into).await,
            REQUEST_STEP_OUT => self.handle_step(request, StepKind::Out).await,
            REQUEST_THREADS => self.handle_threads(request).await,
            REQUEST_STACK_TRACE => self.handle_stack_trace(request).await,
            REQUEST_SCOPES => self.handle_scopes(request).await,
            REQUEST_VARIABLES => self.handle_variables(request).await,
            REQUEST_LINE_BREAKPOINT_INFO => self.handle_line_breakpoint_info(request).await,
            REQUEST_WORKSPACE_SETTINGS => self.handle_workspace_settings(request).await,
            REQUEST_EXCEPTION_BREAKPOINT => self.handle_exception_breakpoint(request).await,
            REQUEST_LIST_EXCEPTION_BREAKPOINTS => {
                self.handle_list_exception_breakpoints(request).await
            }
            other => {
                let message = format!("Unrecognized request: {other}");
                self.respond_fail(&request, message).await
            }
        }
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// The initialize response is held back until the source-location index
    /// arrives; breakpoints cannot be verified without it, and the editor
    /// treats capabilities as a signal that configuration may begin.
    async fn handle_initialize(&mut self, request: Request) -> Result<()> {
        let args: InitializeRequestArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        debug!(
            adapter_id = %args.adapter_id,
            client_id = ?args.client_id,
            "initialize received"
        );
        self.source_index = None;
        self.threads.clear();
        self.variables.reset();
        self.stop_reasons.clear();
        if let Some(breakpoints) = &mut self.breakpoints {
            breakpoints.clear();
        }

        self.initialize_deadline = Some(Instant::now() + self.initialize_timeout());
        self.pending_initialize = Some(request);
        Ok(())
    }

    async fn complete_initialize(&mut self) -> Result<()> {
        let Some(request) = self.pending_initialize.take() else {
            return Ok(());
        };
        self.initialize_deadline = None;
        let capabilities = Capabilities {
            supports_configuration_done_request: Some(true),
            supports_conditional_breakpoints: Some(false),
            supports_delayed_stack_trace_loading: Some(false),
            supports_evaluate_for_hovers: Some(false),
        };
        self.state = AdapterState::Initialized;
        self.respond_ok_with(&request, serde_json::to_value(capabilities)?)
            .await
    }

    pub(super) async fn expire_initialize(&mut self) -> Result<()> {
        self.initialize_deadline = None;
        let Some(request) = self.pending_initialize.take() else {
            return Ok(());
        };
        warn!("no source-location index before the initialize deadline");
        self.respond_fail(
            &request,
            "Language services are not ready. Deploy the project and start the session again.",
        )
        .await
    }

    async fn handle_launch(&mut self, request: Request) -> Result<()> {
        if self.state != AdapterState::Initialized {
            return self.respond_fail(&request, "Adapter is not initialized").await;
        }
        let args: LaunchRequestArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let index = self.source_index.clone().unwrap_or_default();
        if index.is_empty() {
            return self
                .respond_fail(
                    &request,
                    "No executable lines are known for this project. \
                     Deploy the project and start the session again.",
                )
                .await;
        }
        let project = PathBuf::from(&args.project);

        let connection = match self.record_client.connection_info(&project).await {
            Ok(connection) => connection,
            Err(err) => return self.respond_command_error(&request, &err).await,
        };
        let request_service = match RequestService::new(connection.clone(), &self.settings) {
            Ok(service) => service,
            Err(err) => return self.respond_command_error(&request, &err).await,
        };
        let mut streaming =
            match StreamingService::new(&connection, &self.settings, self.notice_tx.clone()) {
                Ok(service) => service,
                Err(err) => return self.respond_command_error(&request, &err).await,
            };
        if let Err(err) = streaming.subscribe().await {
            return self.respond_command_error(&request, &err).await;
        }

        let mut session = SessionService::new(self.record_client.clone(), &project);
        let filters = SessionFilters {
            user_ids: args.user_id_filter.clone(),
            request_types: args.request_type_filter.clone(),
            entry_points: args.entry_point_filter.clone(),
        };
        let session_id = match session.start(&filters).await {
            Ok(id) => id,
            Err(err) => {
                streaming.disconnect().await;
                return self.respond_command_error(&request, &err).await;
            }
        };

        let mut breakpoints = BreakpointService::new(self.record_client.clone(), &project);
        breakpoints.set_source_index(index);

        self.requests = Some(request_service);
        self.streaming = Some(streaming);
        self.session = Some(session);
        self.breakpoints = Some(breakpoints);
        self.state = AdapterState::Running;

        self.respond_ok(&request).await?;
        self.output_console(&format!("Debugger session started: {session_id}"))
            .await?;
        self.writer.send_event(EVENT_INITIALIZED, None).await
    }

    async fn handle_disconnect(&mut self, request: Request) -> Result<()> {
        if let Some(streaming) = &mut self.streaming {
            streaming.disconnect().await;
        }
        if let Some(session) = &mut self.session {
            if session.is_connected() {
                match session.stop().await {
                    Ok(session_id) => {
                        self.output_console(&format!("Debugger session ended: {session_id}"))
                            .await?;
                    }
                    Err(err) => {
                        // disconnect must complete either way
                        let (message, _) = super::error_parts(&err);
                        self.show_message(SHOW_MESSAGE_TYPE_ERROR, &message).await?;
                    }
                }
            }
        }
        if let Some(breakpoints) = &mut self.breakpoints {
            breakpoints.clear();
        }
        self.respond_ok(&request).await?;
        self.state = AdapterState::Terminated;
        Ok(())
    }

    // ------------------------------------------------------------------
    // breakpoints
    // ------------------------------------------------------------------

    async fn handle_set_breakpoints(&mut self, request: Request) -> Result<()> {
        let args: SetBreakpointsArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let path = args.source.path.clone().unwrap_or_default();
        let uri = path_to_uri(&path);
        let requested: Vec<u32> = args
            .breakpoints
            .unwrap_or_default()
            .iter()
            .map(|b| b.line)
            .collect();

        let Some(session_id) = self.current_session_id() else {
            // without a session every breakpoint stays local and unverified
            let body = SetBreakpointsResponseBody {
                breakpoints: requested
                    .iter()
                    .map(|line| Breakpoint {
                        verified: false,
                        source: Some(args.source.clone()),
                        line: Some(*line),
                    })
                    .collect(),
            };
            return self
                .respond_ok_with(&request, serde_json::to_value(body)?)
                .await;
        };

        let breakpoints = self.breakpoints.as_mut().expect("running session");
        let installed = match breakpoints
            .reconcile_line_breakpoints(&session_id, &uri, &requested)
            .await
        {
            Ok(installed) => installed,
            Err(err) => return self.respond_command_error(&request, &err).await,
        };
        let body = SetBreakpointsResponseBody {
            breakpoints: requested
                .iter()
                .map(|line| Breakpoint {
                    verified: installed.contains(line),
                    source: Some(args.source.clone()),
                    line: Some(*line),
                })
                .collect(),
        };
        self.respond_ok_with(&request, serde_json::to_value(body)?)
            .await
    }

    /// The standard request only carries opaque filter names; break modes
    /// arrive through the custom exceptionBreakpoint request instead, so the
    /// filters are acknowledged without effect.
    async fn handle_set_exception_breakpoints(&mut self, request: Request) -> Result<()> {
        let args: SetExceptionBreakpointsArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        debug!(filters = ?args.filters, "standard exception filters ignored");
        self.respond_ok(&request).await
    }

    async fn handle_exception_breakpoint(&mut self, request: Request) -> Result<()> {
        let args: ExceptionBreakpointArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let Some(session_id) = self.current_session_id() else {
            return self.respond_fail(&request, "No active debugger session").await;
        };
        let breakpoints = self.breakpoints.as_mut().expect("running session");
        match breakpoints
            .reconcile_exception_breakpoints(&session_id, &args.typeref, &args.break_mode)
            .await
        {
            Ok(()) => self.respond_ok(&request).await,
            Err(err) => self.respond_command_error(&request, &err).await,
        }
    }

    async fn handle_list_exception_breakpoints(&mut self, request: Request) -> Result<()> {
        let typerefs = self
            .breakpoints
            .as_ref()
            .map(|b| b.exception_breakpoint_cache())
            .unwrap_or_default();
        self.respond_ok_with(&request, serde_json::json!({ "typerefs": typerefs }))
            .await
    }

    // ------------------------------------------------------------------
    // execution control
    // ------------------------------------------------------------------

    fn resolve_request_id(&self, thread_id: i64) -> Option<String> {
        self.threads.request_for(thread_id).map(str::to_string)
    }

    async fn handle_continue(&mut self, request: Request) -> Result<()> {
        let args: ThreadArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let Some(request_id) = self.resolve_request_id(args.thread_id) else {
            let message = format!("Thread {} is not paused in this session", args.thread_id);
            return self.respond_fail(&request, message).await;
        };
        let Some(service) = &self.requests else {
            return self.respond_fail(&request, "No active debugger session").await;
        };
        match service.execute(&RunCommand::new(&request_id)).await {
            Ok(_) => {
                self.variables.reset();
                self.respond_ok_with(
                    &request,
                    serde_json::json!({ "allThreadsContinued": false }),
                )
                .await
            }
            Err(err) => self.respond_command_error(&request, &err).await,
        }
    }

    async fn handle_step(&mut self, request: Request, kind: StepKind) -> Result<()> {
        let args: ThreadArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let Some(request_id) = self.resolve_request_id(args.thread_id) else {
            let message = format!("Thread {} is not paused in this session", args.thread_id);
            return self.respond_fail(&request, message).await;
        };
        let Some(service) = &self.requests else {
            return self.respond_fail(&request, "No active debugger session").await;
        };
        match service.execute(&StepCommand::new(&request_id, kind)).await {
            Ok(_) => {
                self.variables.reset();
                self.respond_ok(&request).await
            }
            Err(err) => self.respond_command_error(&request, &err).await,
        }
    }

    // ------------------------------------------------------------------
    // inspection
    // ------------------------------------------------------------------

    async fn handle_threads(&mut self, request: Request) -> Result<()> {
        let threads: Vec<Thread> = self
            .threads
            .iter()
            .map(|(id, request_id)| Thread {
                id,
                name: format!("Request ID: {request_id}"),
            })
            .collect();
        let body = ThreadsResponseBody { threads };
        self.respond_ok_with(&request, serde_json::to_value(body)?)
            .await
    }

    async fn handle_stack_trace(&mut self, request: Request) -> Result<()> {
        let args: StackTraceArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let Some(request_id) = self.resolve_request_id(args.thread_id) else {
            let message = format!("Thread {} is not paused in this session", args.thread_id);
            return self.respond_fail(&request, message).await;
        };
        let Some(service) = &self.requests else {
            return self.respond_fail(&request, "No active debugger session").await;
        };
        let raw = match service.execute(&StateCommand::new(&request_id)).await {
            Ok(raw) => raw,
            Err(err) => return self.respond_command_error(&request, &err).await,
        };
        let response: DebuggerResponse = match serde_json::from_str(&raw) {
            Ok(response) => response,
            Err(err) => {
                let message = format!("Undecodable state response: {err}");
                return self.respond_fail(&request, message).await;
            }
        };

        let server_frames = response.stack_frames();
        let total = server_frames.len();
        let start = args.start_frame.unwrap_or(0);
        let count = args.levels.filter(|levels| *levels > 0).unwrap_or(total);
        let mut stack_frames = Vec::new();
        for frame in server_frames.iter().skip(start).take(count) {
            let frame_id = self.variables.frames.create(FrameInfo {
                request_id: request_id.clone(),
                frame_number: frame.frame_number,
            });
            let source = self
                .breakpoints
                .as_ref()
                .and_then(|b| b.source_path_for_typeref(&frame.type_ref))
                .map(|uri| Source::from_path(uri_to_path(uri)));
            stack_frames.push(StackFrame {
                id: frame_id,
                name: frame.full_name.clone(),
                source,
                line: frame.line_number,
                column: 0,
            });
        }
        let body = StackTraceResponseBody {
            stack_frames,
            total_frames: Some(total),
        };
        self.respond_ok_with(&request, serde_json::to_value(body)?)
            .await
    }

    async fn handle_scopes(&mut self, request: Request) -> Result<()> {
        let args: ScopesArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let Some(frame) = self.variables.frames.get(args.frame_id).cloned() else {
            // stale frame handle after a resume: nothing to show
            let body = ScopesResponseBody { scopes: vec![] };
            return self
                .respond_ok_with(&request, serde_json::to_value(body)?)
                .await;
        };
        let scopes = [ScopeKind::Local, ScopeKind::Static, ScopeKind::Global]
            .into_iter()
            .map(|kind| {
                let reference = self.variables.containers.create(VariableContainer::Scope {
                    kind,
                    request_id: frame.request_id.clone(),
                    frame_number: frame.frame_number,
                });
                Scope {
                    name: kind.label().to_string(),
                    variables_reference: reference,
                    expensive: false,
                }
            })
            .collect();
        let body = ScopesResponseBody { scopes };
        self.respond_ok_with(&request, serde_json::to_value(body)?)
            .await
    }

    async fn handle_variables(&mut self, request: Request) -> Result<()> {
        let args: VariablesArguments = match parse_arguments(&request) {
            Ok(args) => args,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        let Some(container) = self
            .variables
            .containers
            .get(args.variables_reference)
            .cloned()
        else {
            return self
                .respond_ok_with(&request, serde_json::json!({ "variables": [] }))
                .await;
        };
        let result = match container {
            VariableContainer::Scope {
                kind,
                request_id,
                frame_number,
            } => self.expand_scope(kind, &request_id, frame_number).await,
            VariableContainer::Reference {
                request_id,
                reference_id,
            } => self.expand_reference(&request_id, reference_id).await,
        };
        match result {
            Ok(variables) => {
                self.respond_ok_with(&request, serde_json::json!({ "variables": variables }))
                    .await
            }
            Err(err) => self.respond_command_error(&request, &err).await,
        }
    }

    async fn expand_scope(
        &mut self,
        kind: ScopeKind,
        request_id: &str,
        frame_number: u32,
    ) -> Result<Vec<Variable>> {
        let service = self
            .requests
            .as_ref()
            .ok_or_else(|| tether_core::Error::Protocol("No active debugger session".to_string()))?;
        let raw = service
            .execute(&FrameCommand::new(request_id, frame_number))
            .await?;
        let response: DebuggerResponse = serde_json::from_str(&raw)?;
        let Some(frame) = response.frame_response.and_then(|r| r.frame) else {
            return Ok(vec![]);
        };
        let mut values = match kind {
            ScopeKind::Local => frame.locals.map(|v| v.values).unwrap_or_default(),
            ScopeKind::Static => frame.statics.map(|v| v.values).unwrap_or_default(),
            ScopeKind::Global => frame.globals.map(|v| v.values).unwrap_or_default(),
        };
        values.sort_by_key(|value| value.slot.unwrap_or(u32::MAX));
        Ok(values
            .iter()
            .enumerate()
            .map(|(i, value)| self.to_variable(request_id, value, i))
            .collect())
    }

    async fn expand_reference(
        &mut self,
        request_id: &str,
        reference_id: i64,
    ) -> Result<Vec<Variable>> {
        let service = self
            .requests
            .as_ref()
            .ok_or_else(|| tether_core::Error::Protocol("No active debugger session".to_string()))?;
        let raw = service
            .execute(&ReferencesCommand::new(request_id, vec![reference_id]))
            .await?;
        let response: DebuggerResponse = serde_json::from_str(&raw)?;
        let references = response
            .references_response
            .and_then(|r| r.references)
            .map(|set| set.references)
            .unwrap_or_default();
        let Some(reference) = references.into_iter().find(|r| r.id == reference_id) else {
            return Ok(vec![]);
        };

        let mut variables = Vec::new();
        if let Some(fields) = &reference.fields {
            for (i, field) in fields.iter().enumerate() {
                variables.push(self.to_variable(request_id, field, i));
            }
        }
        if let Some(entries) = &reference.value {
            for (i, entry) in entries.iter().enumerate() {
                variables.push(self.to_variable(request_id, entry, i));
            }
        }
        if let Some(tuples) = &reference.tuple {
            for tuple in tuples {
                let name = tuple
                    .key
                    .as_ref()
                    .map(|key| key.display())
                    .unwrap_or_else(|| "key".to_string());
                let (value_text, nested) = match &tuple.value {
                    Some(value) => (value.display(), value.reference),
                    None => ("null".to_string(), None),
                };
                let variables_reference = nested
                    .map(|id| {
                        self.variables
                            .containers
                            .create(VariableContainer::Reference {
                                request_id: request_id.to_string(),
                                reference_id: id,
                            })
                    })
                    .unwrap_or(0);
                variables.push(Variable {
                    name,
                    value: value_text,
                    type_name: None,
                    variables_reference,
                });
            }
        }
        Ok(variables)
    }

    /// Convert a remote value to a DAP variable, minting a container handle
    /// when it references the heap. `position` names anonymous entries.
    fn to_variable(
        &mut self,
        request_id: &str,
        value: &responses::Value,
        position: usize,
    ) -> Variable {
        let variables_reference = value
            .reference
            .map(|id| {
                self.variables
                    .containers
                    .create(VariableContainer::Reference {
                        request_id: request_id.to_string(),
                        reference_id: id,
                    })
            })
            .unwrap_or(0);
        let name = if value.name.is_empty() {
            format!("[{position}]")
        } else {
            value.name.clone()
        };
        let type_name = match value.type_name() {
            "" => None,
            name => Some(name.to_string()),
        };
        Variable {
            name,
            value: value.display(),
            type_name,
            variables_reference,
        }
    }

    // ------------------------------------------------------------------
    // custom requests
    // ------------------------------------------------------------------

    async fn handle_line_breakpoint_info(&mut self, request: Request) -> Result<()> {
        let infos: Vec<LineBreakpointInfo> =
            match parse_arguments::<Option<Vec<LineBreakpointInfo>>>(&request) {
                Ok(infos) => infos.unwrap_or_default(),
                Err(message) => return self.respond_fail(&request, message).await,
            };
        debug!(entries = infos.len(), "source-location index received");
        if let Some(breakpoints) = &mut self.breakpoints {
            breakpoints.set_source_index(infos.clone());
        }
        self.source_index = Some(infos);
        self.respond_ok(&request).await?;
        self.complete_initialize().await
    }

    async fn handle_workspace_settings(&mut self, request: Request) -> Result<()> {
        let settings: WorkspaceSettings = match parse_arguments(&request) {
            Ok(settings) => settings,
            Err(message) => return self.respond_fail(&request, message).await,
        };
        debug!(?settings, "workspace settings received");
        self.settings = settings;
        self.respond_ok(&request).await
    }
}
