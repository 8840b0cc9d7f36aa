//! Canonical event union for everything the monitor publishes.
//!
//! This module is the single source of truth for events flowing from the
//! change detector through the event bus to the distribution hub.
//!
//! # Structure
//!
//! - `service` - Service state transitions
//! - `host` - Host reachability transitions
//!
//! Events are immutable once constructed: they are created at the moment a
//! transition is recognized, published once, and discarded after delivery.

mod host;
mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ServiceState, SourceKind};

/// Every event the monitor can publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A service moved between running and stopped.
    ServiceStateChanged {
        host: String,
        service: String,
        source: SourceKind,
        previous_state: ServiceState,
        current_state: ServiceState,
        /// Latest status text at the moment of the transition.
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// A host went from reachable to unreachable.
    HostUnreachable {
        host: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A host went from unreachable back to reachable.
    HostRecovered {
        host: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    /// Get the event name for logs and metrics labels.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::ServiceStateChanged { .. } => "service:state_changed",
            Self::HostUnreachable { .. } => "host:unreachable",
            Self::HostRecovered { .. } => "host:recovered",
        }
    }

    /// Host the event concerns.
    pub fn host(&self) -> &str {
        match self {
            Self::ServiceStateChanged { host, .. }
            | Self::HostUnreachable { host, .. }
            | Self::HostRecovered { host, .. } => host,
        }
    }

    /// Creation time of the event.
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ServiceStateChanged { timestamp, .. }
            | Self::HostUnreachable { timestamp, .. }
            | Self::HostRecovered { timestamp, .. } => *timestamp,
        }
    }
}
