//! Streaming notice dispatch
//!
//! Everything the streaming side produces arrives on one channel and is
//! handled here, strictly in order. Debugger events are dropped when no
//! session is active, when they belong to another session on the shared
//! topics, or when their replay position was already processed.

use super::{AdapterState, DebugAdapter};
use crate::constants::*;
use crate::protocol::{StoppedEventBody, ThreadEventBody};
use tether_core::{DebuggerEventType, Result, StreamMessage};
use tether_streaming::StreamingNotice;
use tokio::io::AsyncWrite;
use tracing::debug;

impl<W> DebugAdapter<W>
where
    W: AsyncWrite + Unpin,
{
    pub(super) async fn handle_notice(&mut self, notice: StreamingNotice) -> Result<()> {
        match notice {
            StreamingNotice::Connected { channel } => {
                self.output_console(&format!("Event channel {channel} reconnected"))
                    .await
            }
            StreamingNotice::Disconnected { channel } => {
                self.show_message(
                    SHOW_MESSAGE_TYPE_WARNING,
                    &format!("Connection to the event channel {channel} was lost; reconnecting"),
                )
                .await
            }
            StreamingNotice::Error { channel, reason } => {
                self.output_stderr(&format!("Event channel {channel} error: {reason}"))
                    .await
            }
            StreamingNotice::Message(message) => self.dispatch_event(message).await,
        }
    }

    async fn dispatch_event(&mut self, message: StreamMessage) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let Some(session_id) = &message.sobject.session_id else {
            return Ok(());
        };
        if !session.is_current(session_id) {
            return Ok(());
        }
        let event_type = message.sobject.event_type;
        let replay_id = message.event.replay_id;
        if self
            .streaming
            .as_ref()
            .is_some_and(|s| s.has_processed(event_type, replay_id))
        {
            debug!(?event_type, replay_id, "duplicate event discarded");
            return Ok(());
        }

        self.log_event(&message).await?;
        match event_type {
            DebuggerEventType::RequestStarted => self.on_request_started(&message).await?,
            DebuggerEventType::RequestFinished => self.on_request_finished(&message).await?,
            DebuggerEventType::Stopped => self.on_stopped(&message).await?,
            DebuggerEventType::SessionTerminated => self.on_session_terminated(&message).await?,
            DebuggerEventType::SystemWarning => {
                if let Some(description) = &message.sobject.description {
                    self.show_message(SHOW_MESSAGE_TYPE_WARNING, description)
                        .await?;
                }
            }
            DebuggerEventType::SystemGack => {
                if let Some(description) = &message.sobject.description {
                    self.show_message(SHOW_MESSAGE_TYPE_ERROR, description)
                        .await?;
                }
            }
            // logged above, no protocol effect
            DebuggerEventType::Resumed
            | DebuggerEventType::Debug
            | DebuggerEventType::SystemInfo => {}
            _ => {}
        }
        if let Some(streaming) = &mut self.streaming {
            streaming.mark_processed(event_type, replay_id);
        }
        Ok(())
    }

    /// Every handled event leaves a line in the debug console.
    async fn log_event(&mut self, message: &StreamMessage) -> Result<()> {
        let record = &message.sobject;
        let mut line = message
            .event
            .created_date
            .clone()
            .unwrap_or_else(|| "unknown time".to_string());
        line.push_str(&format!(" | {:?}", record.event_type));
        if let Some(request_id) = &record.request_id {
            line.push_str(&format!(" | Request: {request_id}"));
        }
        if let Some(breakpoint_id) = &record.breakpoint_id {
            line.push_str(&format!(" | Breakpoint: {breakpoint_id}"));
        }
        if let Some(event_line) = record.line {
            line.push_str(&format!(" | Line: {event_line}"));
        }
        if let Some(description) = &record.description {
            line.push_str(&format!(" | {description}"));
        }
        self.output_console(&line).await
    }

    async fn on_request_started(&mut self, message: &StreamMessage) -> Result<()> {
        let Some(request_id) = &message.sobject.request_id else {
            return Ok(());
        };
        if self.threads.contains(request_id) {
            return Ok(());
        }
        let thread_id = self.threads.track(request_id);
        debug!(%request_id, thread_id, "remote request started");
        let body = ThreadEventBody {
            reason: THREAD_REASON_STARTED.to_string(),
            thread_id,
        };
        self.writer
            .send_event(EVENT_THREAD, Some(serde_json::to_value(body)?))
            .await
    }

    async fn on_request_finished(&mut self, message: &StreamMessage) -> Result<()> {
        let Some(request_id) = &message.sobject.request_id else {
            return Ok(());
        };
        let Some(thread_id) = self.threads.release(request_id) else {
            return Ok(());
        };
        self.stop_reasons.remove(&thread_id);
        if self.threads.is_empty() {
            self.variables.reset();
        }
        let body = ThreadEventBody {
            reason: THREAD_REASON_EXITED.to_string(),
            thread_id,
        };
        self.writer
            .send_event(EVENT_THREAD, Some(serde_json::to_value(body)?))
            .await?;

        // allThreadsStopped means the client dropped its pause display for
        // everything when this thread exited; re-announce the others
        let remaining: Vec<i64> = self.threads.iter().map(|(id, _)| id).collect();
        for thread_id in remaining {
            let reason = self
                .stop_reasons
                .get(&thread_id)
                .cloned()
                .unwrap_or_else(|| STOP_REASON_BREAKPOINT.to_string());
            let body = StoppedEventBody {
                reason,
                thread_id,
                all_threads_stopped: true,
            };
            self.writer
                .send_event(EVENT_STOPPED, Some(serde_json::to_value(body)?))
                .await?;
        }
        Ok(())
    }

    async fn on_stopped(&mut self, message: &StreamMessage) -> Result<()> {
        let Some(request_id) = &message.sobject.request_id else {
            return Ok(());
        };
        let Some(thread_id) = self.threads.thread_for(request_id) else {
            return Ok(());
        };
        // frame handles of the previous pause are invalid now; keep them
        // only while a second request is being debugged in parallel
        if self.threads.iter().count() == 1 {
            self.variables.reset();
        }
        let reason = if message.sobject.breakpoint_id.is_some() {
            STOP_REASON_BREAKPOINT
        } else {
            STOP_REASON_STEP
        };
        self.stop_reasons.insert(thread_id, reason.to_string());
        let body = StoppedEventBody {
            reason: reason.to_string(),
            thread_id,
            all_threads_stopped: true,
        };
        self.writer
            .send_event(EVENT_STOPPED, Some(serde_json::to_value(body)?))
            .await
    }

    async fn on_session_terminated(&mut self, message: &StreamMessage) -> Result<()> {
        if let Some(description) = &message.sobject.description {
            self.output_stderr(description).await?;
            self.show_message(SHOW_MESSAGE_TYPE_ERROR, description).await?;
        }
        if let Some(session) = &mut self.session {
            session.force_stop();
        }
        self.state = AdapterState::Initialized;
        self.writer.send_event(EVENT_TERMINATED, None).await
    }
}
