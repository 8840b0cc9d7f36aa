//! HTTP and WebSocket handlers.

pub mod events;
pub mod snapshot;
