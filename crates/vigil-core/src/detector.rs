//! Change detection: turns observations into published transitions.
//!
//! Every watcher funnels its observations and host health reports through a
//! shared [`ChangeDetector`]. The detector compares each one with the State
//! Store and publishes an event only for genuine transitions that happen
//! outside the discovery phase:
//!
//! | Stored entry | Observation | Effect |
//! |---|---|---|
//! | absent | any | insert, log "discovered", no event |
//! | present, other state | - | overwrite, publish `ServiceStateChanged` |
//! | present, same state | - | overwrite status silently |
//!
//! Host reachability follows the same rules with `HostUnreachable` and
//! `HostRecovered`.
//!
//! # Locking
//!
//! Events are published while the store lock for the affected map is held,
//! so the bus registry lock nests inside it (never the other way round).
//! This keeps every key's events in the order of the writes that produced
//! them, which publishing after release could not guarantee for two writers
//! racing on one key. The nested section is short: publishing never waits
//! on a subscriber, it only enqueues or drops.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::discovery::DiscoveryGate;
use crate::domain::ServiceObservation;
use crate::events::MonitorEvent;
use crate::ports::EventPublisher;
use crate::store::{HostTransition, ServiceTransition, StateStore};

/// Compares observations with the State Store and publishes transitions.
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<StateStore>,
    publisher: Arc<dyn EventPublisher>,
    gate: Arc<DiscoveryGate>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("services", &self.store.service_count())
            .field("in_discovery", &self.gate.in_discovery())
            .finish_non_exhaustive()
    }
}

impl ChangeDetector {
    /// Create a detector over a store, publishing through `publisher`.
    pub fn new(
        store: Arc<StateStore>,
        publisher: Arc<dyn EventPublisher>,
        gate: Arc<DiscoveryGate>,
    ) -> Self {
        Self {
            store,
            publisher,
            gate,
        }
    }

    /// Record a service observation, publishing a state change if warranted.
    pub fn observe(&self, obs: &ServiceObservation) -> ServiceTransition {
        let suppressed = self.gate.in_discovery();
        self.store.record_service(obs, |transition| match transition {
            ServiceTransition::Discovered => {
                debug!(
                    host = %obs.host,
                    service = %obs.service_name,
                    source = %obs.source,
                    state = %obs.state,
                    "Discovered service"
                );
            }
            ServiceTransition::StateChanged { previous } => {
                if suppressed {
                    debug!(
                        host = %obs.host,
                        service = %obs.service_name,
                        %previous,
                        current = %obs.state,
                        "State change during discovery, not published"
                    );
                    return;
                }
                info!(
                    host = %obs.host,
                    service = %obs.service_name,
                    source = %obs.source,
                    %previous,
                    current = %obs.state,
                    "Service state changed"
                );
                self.publisher
                    .publish(MonitorEvent::service_state_changed(obs, previous));
            }
            ServiceTransition::StatusUpdated | ServiceTransition::Unchanged => {}
        })
    }

    /// Record whether contacting `host` succeeded.
    ///
    /// `outcome` is `Ok(())` on success and `Err(reason)` on failure.
    pub fn report_host(&self, host: &str, outcome: Result<(), &str>) -> HostTransition {
        let suppressed = self.gate.in_discovery();
        self.store
            .record_host(host, outcome, |transition, record| match transition {
                HostTransition::FirstContact { reachable: true } => {
                    debug!(host, "First contact with host");
                }
                HostTransition::FirstContact { reachable: false } => {
                    warn!(host, reason = %record.last_error, "Host unreachable on first contact");
                }
                HostTransition::BecameUnreachable => {
                    warn!(host, reason = %record.last_error, suppressed, "Host unreachable");
                    if !suppressed {
                        self.publisher
                            .publish(MonitorEvent::host_unreachable(host, &record.last_error));
                    }
                }
                HostTransition::Recovered => {
                    info!(host, suppressed, "Host recovered");
                    if !suppressed {
                        self.publisher.publish(MonitorEvent::host_recovered(host));
                    }
                }
                HostTransition::Unchanged => {}
            })
    }

    /// The store this detector writes to.
    pub const fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// The discovery gate consulted before publishing.
    pub const fn gate(&self) -> &Arc<DiscoveryGate> {
        &self.gate
    }
}
