//! Host reachability events.

use chrono::Utc;

use super::MonitorEvent;

impl MonitorEvent {
    /// Create a host unreachable event.
    pub fn host_unreachable(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HostUnreachable {
            host: host.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a host recovered event.
    pub fn host_recovered(host: impl Into<String>) -> Self {
        Self::HostRecovered {
            host: host.into(),
            timestamp: Utc::now(),
        }
    }
}
