//! Tether DAP adapter
//!
//! Bridges a Debug Adapter Protocol client on stdio to the remote debugger
//! of an org: session records and breakpoints go through the org CLI,
//! execution control goes through the debugger HTTP API, and debugger events
//! arrive over the long-poll streaming transport.
//!
//! The [`adapter::DebugAdapter`] run loop is the single serialization point;
//! everything else in this crate is a service it owns.

pub mod adapter;
pub mod breakpoints;
pub mod constants;
pub mod protocol;
pub mod session;
pub mod threads;
pub mod transport;
pub mod variables;

pub use adapter::{AdapterState, DebugAdapter};
pub use breakpoints::BreakpointService;
pub use session::{SessionFilters, SessionService};
pub use threads::ThreadRegistry;
pub use transport::{spawn_reader, MessageWriter};
