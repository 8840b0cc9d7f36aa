//! Core of the vigil service monitor.
//!
//! Watchers (in `vigil-runtime`) report [`ServiceObservation`]s and host
//! health to a shared [`ChangeDetector`]. The detector keeps the
//! [`StateStore`] current and publishes genuine transitions, outside the
//! discovery phase, to the [`EventBus`]. Subscribers such as the
//! distribution hub (in `vigil-axum`) turn events into [`wire`] messages.
//!
//! This crate performs no I/O.
#![deny(unused_crate_dependencies)]

pub mod bus;
pub mod detector;
pub mod discovery;
pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;
pub mod store;
pub mod wire;

// Re-export commonly used types for convenience
pub use bus::{BusStats, EventBus, SubscriberId, Subscription};
pub use detector::ChangeDetector;
pub use discovery::{DiscoveryGate, SweepToken};
pub use domain::{
    HostRecord, ServiceKey, ServiceObservation, ServiceRecord, ServiceState, SourceKind,
};
pub use events::MonitorEvent;
pub use ports::{EventPublisher, ProviderError, ServiceProvider};
pub use settings::{HostConfig, MonitorSettings, SettingsError, Whitelist, validate_settings};
pub use store::{HostTransition, ServiceTransition, StateStore};
pub use wire::{WireBody, WireError, WireMessage, decode_frame, encode_frame};

// Dev-dependencies used only by integration tests
#[cfg(test)]
use proptest as _;
