//! Event publisher trait for handing transitions to the outside world.
//!
//! The change detector only knows this trait. The in-process [`EventBus`]
//! is the production implementation; tests substitute mocks.
//!
//! [`EventBus`]: crate::bus::EventBus

use crate::events::MonitorEvent;

/// Trait for publishing monitor events.
///
/// [`EventBus`](crate::bus::EventBus) is the production implementation:
/// bounded fan-out to any number of subscribers.
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// Called while the State Store lock is held, so implementations must
    /// never block or await.
    fn publish(&self, event: MonitorEvent);
}
