//! The State Store: last known service state and host reachability.
//!
//! The store owns two mutex-guarded maps and exposes only atomic
//! "upsert and report the transition" operations. Callers never see the maps
//! themselves, so every read-modify-write goes through the same lock.
//!
//! Each upsert takes a callback that runs while the lock is still held. The
//! change detector publishes from inside it, which keeps events for a single
//! key in the same order as the writes that produced them.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{HostRecord, ServiceKey, ServiceObservation, ServiceRecord, ServiceState};

/// Outcome of recording a service observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTransition {
    /// First sighting of this key; the entry was inserted.
    Discovered,
    /// The run state differs from the stored one.
    StateChanged { previous: ServiceState },
    /// Same run state, different status text.
    StatusUpdated,
    /// Identical to what was stored.
    Unchanged,
}

/// Outcome of recording a host reachability report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTransition {
    /// First report for this host; the entry was inserted.
    FirstContact { reachable: bool },
    /// Reachable before, unreachable now.
    BecameUnreachable,
    /// Unreachable before, reachable now.
    Recovered,
    /// Same reachability as before (the error text may have been refreshed).
    Unchanged,
}

/// Guarded owner of the two shared maps.
#[derive(Debug, Default)]
pub struct StateStore {
    services: Mutex<HashMap<ServiceKey, ServiceRecord>>,
    hosts: Mutex<HashMap<String, HostRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // The maps only hold plain values, so a panic elsewhere cannot leave
    // them half-updated.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a service observation and report what changed.
    ///
    /// `on_transition` runs before the lock is released.
    pub fn record_service<F>(&self, obs: &ServiceObservation, on_transition: F) -> ServiceTransition
    where
        F: FnOnce(ServiceTransition),
    {
        let mut services = lock(&self.services);
        let transition = match services.get_mut(&obs.key()) {
            None => {
                services.insert(obs.key(), ServiceRecord::from(obs));
                ServiceTransition::Discovered
            }
            Some(stored) if stored.state != obs.state => {
                let previous = stored.state;
                *stored = ServiceRecord::from(obs);
                ServiceTransition::StateChanged { previous }
            }
            Some(stored) if stored.status != obs.status || stored.source != obs.source => {
                stored.status.clone_from(&obs.status);
                stored.source = obs.source;
                ServiceTransition::StatusUpdated
            }
            Some(_) => ServiceTransition::Unchanged,
        };
        on_transition(transition);
        transition
    }

    /// Upsert a host reachability report and report what changed.
    ///
    /// `outcome` is `Ok(())` for a successful contact and `Err(reason)` for a
    /// failed one. `on_transition` runs before the lock is released.
    pub fn record_host<F>(&self, host: &str, outcome: Result<(), &str>, on_transition: F) -> HostTransition
    where
        F: FnOnce(HostTransition, &HostRecord),
    {
        let record = match outcome {
            Ok(()) => HostRecord::reachable(host),
            Err(reason) => HostRecord::unreachable(host, reason),
        };

        let mut hosts = lock(&self.hosts);
        let transition = match hosts.get(host) {
            None => HostTransition::FirstContact {
                reachable: record.reachable,
            },
            Some(stored) => match (stored.reachable, record.reachable) {
                (true, false) => HostTransition::BecameUnreachable,
                (false, true) => HostTransition::Recovered,
                _ => HostTransition::Unchanged,
            },
        };
        on_transition(transition, &record);
        hosts.insert(host.to_string(), record);
        transition
    }

    /// Last known state of one service.
    pub fn service(&self, host: &str, service_name: &str) -> Option<ServiceRecord> {
        lock(&self.services)
            .get(&ServiceKey::new(host, service_name))
            .cloned()
    }

    /// Last known reachability of one host.
    pub fn host(&self, host: &str) -> Option<HostRecord> {
        lock(&self.hosts).get(host).cloned()
    }

    /// All services, sorted by key.
    pub fn services(&self) -> Vec<ServiceRecord> {
        let services = lock(&self.services);
        let mut entries: Vec<_> = services.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, record)| record.clone()).collect()
    }

    /// All hosts, sorted by name.
    pub fn hosts(&self) -> Vec<HostRecord> {
        let mut hosts: Vec<_> = lock(&self.hosts).values().cloned().collect();
        hosts.sort_by(|a, b| a.host.cmp(&b.host));
        hosts
    }

    /// Number of tracked services.
    pub fn service_count(&self) -> usize {
        lock(&self.services).len()
    }
}
