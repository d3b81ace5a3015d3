//! Tether configuration
//!
//! Constants and configuration structs shared by the command, streaming and
//! adapter layers. Everything that is tunable lives here.

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::{OrgCliConfig, WorkspaceSettings};
