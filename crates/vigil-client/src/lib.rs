//! Viewer side of the vigil event stream.
//!
//! - [`backoff`]: exponential reconnect delay
//! - [`machine`]: pure connection state machine
//! - [`client`]: WebSocket driver built on the two
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod backoff;
pub mod client;
pub mod machine;

pub use backoff::{Backoff, ReconnectPolicy};
pub use client::{ClientConfig, ClientError, ViewerClient};
pub use machine::{Action, ConnectionState, Input, ReconnectMachine};
