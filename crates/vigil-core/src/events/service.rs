//! Service transition events.

use chrono::Utc;

use super::MonitorEvent;
use crate::domain::{ServiceObservation, ServiceState};

impl MonitorEvent {
    /// Create a service state change event from the observation that caused it.
    pub fn service_state_changed(obs: &ServiceObservation, previous_state: ServiceState) -> Self {
        Self::ServiceStateChanged {
            host: obs.host.clone(),
            service: obs.service_name.clone(),
            source: obs.source,
            previous_state,
            current_state: obs.state,
            status: obs.status.clone(),
            timestamp: Utc::now(),
        }
    }
}
