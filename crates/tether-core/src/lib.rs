//! Tether core - domain types for the remote-debugging bridge
//!
//! This crate holds the types shared by the command, streaming and adapter
//! layers: the error type, streamed debugger events, the source-location
//! index payload, and the org CLI result shapes. It deliberately carries no
//! I/O so that every other crate can depend on it.

pub mod error;
pub mod event;
pub mod index;
pub mod record;

pub use error::{Error, RemoteErrorDetail, Result};
pub use event::{DebuggerEventRecord, DebuggerEventType, StreamEventInfo, StreamMessage};
pub use index::{LineBreakpointInfo, TyperefLines};
pub use record::{CliResponse, ConnectionInfo, RecordResult};
