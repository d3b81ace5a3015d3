//! Remote command layer
//!
//! Two halves, matching the two control planes of the org:
//!
//! - [`RequestService`] executes debugger commands (`run`, `step`, `state`,
//!   `frame`, `references`) over HTTP against the org's debugger endpoint.
//! - [`RecordClient`] manages session and breakpoint records through the org
//!   CLI.

pub mod commands;
pub mod http;
pub mod records;
pub mod responses;

pub use commands::{
    DebuggerCommand, FrameCommand, ReferencesCommand, RunCommand, StateCommand, StepCommand,
    StepKind,
};
pub use http::RequestService;
pub use records::{CliRecordClient, RecordClient};
pub use responses::{DebuggerResponse, FrameState, Reference, ServerFrame, Value};
