//! In-process publish/subscribe router for monitor events.
//!
//! Every subscriber owns a bounded queue. Publishing never waits: when a
//! subscriber's queue is full the new event is dropped *for that subscriber
//! only*, its drop counter is incremented and a warning is logged. Other
//! subscribers are unaffected, so one stalled viewer cannot hold up the
//! detector or anyone else.
//!
//! The subscriber list has its own lock, separate from the State Store's.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::events::MonitorEvent;
use crate::ports::EventPublisher;

/// Default per-subscriber queue capacity.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Opaque handle identifying a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Slot {
    label: String,
    sender: mpsc::Sender<MonitorEvent>,
    dropped: Arc<AtomicU64>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    slots: HashMap<SubscriberId, Slot>,
}

/// Counters describing bus activity since start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusStats {
    pub subscribers: usize,
    pub published: u64,
    pub dropped: u64,
}

/// Bounded fan-out event bus.
pub struct EventBus {
    capacity: usize,
    registry: Mutex<Registry>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus whose subscribers each buffer up to `capacity` events.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            registry: Mutex::new(Registry::default()),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber.
    ///
    /// `label` only appears in logs (e.g. the viewer's address).
    pub fn subscribe(&self, label: impl Into<String>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let label = label.into();

        let mut registry = self.lock();
        registry.next_id += 1;
        let id = SubscriberId(registry.next_id);
        registry.slots.insert(
            id,
            Slot {
                label: label.clone(),
                sender,
                dropped: Arc::clone(&dropped),
            },
        );
        debug!(%id, %label, subscribers = registry.slots.len(), "Subscriber registered");

        Subscription {
            id,
            receiver,
            dropped,
        }
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut registry = self.lock();
        let removed = registry.slots.remove(&id);
        if let Some(slot) = &removed {
            debug!(
                %id,
                label = %slot.label,
                dropped = slot.dropped.load(Ordering::Relaxed),
                "Subscriber removed"
            );
        }
        removed.is_some()
    }

    /// Deliver a copy of `event` to every registered subscriber.
    ///
    /// Never blocks. Subscribers whose receiver has been dropped are removed.
    pub fn publish(&self, event: &MonitorEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut registry = self.lock();
        let mut closed = Vec::new();
        for (id, slot) in &registry.slots {
            match slot.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let dropped = slot.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        %id,
                        label = %slot.label,
                        event = event.event_name(),
                        dropped,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            if let Some(slot) = registry.slots.remove(&id) {
                debug!(%id, label = %slot.label, "Subscriber went away, removed");
            }
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().slots.len()
    }

    /// Current counters.
    pub fn stats(&self) -> BusStats {
        BusStats {
            subscribers: self.subscriber_count(),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: MonitorEvent) {
        Self::publish(self, &event);
    }
}

/// A registered consumer: its handle plus the receive side of its queue.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<MonitorEvent>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Handle to pass to [`EventBus::unsubscribe`].
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        self.receiver.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        self.receiver.try_recv().ok()
    }

    /// Events dropped for this subscriber because its queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(&MonitorEvent::host_recovered("h"));
        assert_eq!(bus.stats().published, 1);
        assert_eq!(bus.stats().dropped, 0);
    }

    #[tokio::test]
    async fn every_subscriber_gets_a_copy() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe("a");
        let mut b = bus.subscribe("b");

        bus.publish(&MonitorEvent::host_recovered("h1"));

        assert_eq!(a.recv().await.unwrap().host(), "h1");
        assert_eq!(b.recv().await.unwrap().host(), "h1");
    }

    #[test]
    fn recv_parks_until_publish() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe("viewer");

        let mut recv = task::spawn(sub.recv());
        assert_pending!(recv.poll());

        bus.publish(&MonitorEvent::host_unreachable("db-01", "timeout"));
        assert!(recv.is_woken());
        let event = assert_ready!(recv.poll());
        assert_eq!(event.map(|e| e.host().to_string()).as_deref(), Some("db-01"));
    }

    #[tokio::test]
    async fn overflow_drops_new_events_and_counts_them() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe("slow");
        let mut fast = bus.subscribe("fast");

        for i in 0..5 {
            bus.publish(&MonitorEvent::host_recovered(format!("h{i}")));
            assert_eq!(fast.recv().await.unwrap().host(), format!("h{i}"));
        }

        assert_eq!(slow.dropped(), 3);
        assert_eq!(fast.dropped(), 0);
        assert_eq!(bus.stats().dropped, 3);
        // Oldest events survive under drop-new.
        assert_eq!(slow.recv().await.unwrap().host(), "h0");
        assert_eq!(slow.recv().await.unwrap().host(), "h1");
        assert!(slow.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_closes_queue() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe("viewer");
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(sub.id()));
        assert!(!bus.unsubscribe(sub.id()));
        assert_eq!(bus.subscriber_count(), 0);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn dropped_receivers_are_pruned_on_publish() {
        let bus = EventBus::default();
        let sub = bus.subscribe("gone");
        drop(sub);
        bus.publish(&MonitorEvent::host_recovered("h"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let bus = EventBus::new(0);
        let _sub = bus.subscribe("x");
        bus.publish(&MonitorEvent::host_recovered("h"));
        assert_eq!(bus.stats().dropped, 0);
    }
}
