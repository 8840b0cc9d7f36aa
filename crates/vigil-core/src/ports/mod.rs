//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.

pub mod event_publisher;
pub mod service_provider;

pub use event_publisher::EventPublisher;
pub use service_provider::{ProviderError, ServiceProvider};
