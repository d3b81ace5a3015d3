//! Streaming subscriber
//!
//! Long-poll Bayeux client for the org's streaming endpoint plus the
//! session-level [`StreamingService`] that pairs the system and user event
//! channels and deduplicates replayed events.

pub mod client;
pub mod service;

pub use client::{StreamingClient, StreamingConfig, StreamingNotice};
pub use service::StreamingService;
