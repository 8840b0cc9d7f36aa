//! Domain types shared by every layer.
//!
//! These are pure data types: observations produced by watchers, the
//! records held by the State Store, and the identifiers tying them together.

mod host;
mod service;

pub use host::HostRecord;
pub use service::{ServiceKey, ServiceObservation, ServiceRecord, ServiceState, SourceKind};
