//! Service observations and stored service records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse run state of a service.
///
/// Backends report far richer states (paused, activating, exited with a
/// code...); watchers collapse them to one of these two and carry the detail
/// in the free-text status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// The service is up.
    Running,
    /// The service is down, paused, failed or exited.
    Stopped,
}

impl ServiceState {
    /// Wire representation (`"running"` / `"stopped"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    /// Build a state from a boolean "is running" flag.
    pub const fn from_running(running: bool) -> Self {
        if running { Self::Running } else { Self::Stopped }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend origin of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Container runtime event stream.
    Docker,
    /// Init-system unit signals.
    Systemd,
    /// Remote host agent polled over HTTP.
    Agent,
    /// Third-party health API polled over HTTP.
    HealthApi,
}

impl SourceKind {
    /// Wire representation of the source.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Systemd => "systemd",
            Self::Agent => "agent",
            Self::HealthApi => "health_api",
        }
    }

    /// Whether this source offers a live event feed (as opposed to polling).
    pub const fn is_push(self) -> bool {
        matches!(self, Self::Docker | Self::Systemd)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported snapshot of one service, from one source.
///
/// Produced by watchers and handed to the change detector; never retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceObservation {
    /// Host the service lives on.
    pub host: String,
    /// Container name, unit name or API-reported service name.
    pub service_name: String,
    /// Which backend produced the observation.
    pub source: SourceKind,
    /// Coarse run state.
    pub state: ServiceState,
    /// Human-readable status text (e.g. `"Up 3 hours"`, `"active (running)"`).
    pub status: String,
}

impl ServiceObservation {
    /// Create a new observation.
    pub fn new(
        host: impl Into<String>,
        service_name: impl Into<String>,
        source: SourceKind,
        state: ServiceState,
        status: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            service_name: service_name.into(),
            source,
            state,
            status: status.into(),
        }
    }

    /// Key under which this observation is stored.
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.host, &self.service_name)
    }
}

/// Store key for a service: `host:service`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey(String);

impl ServiceKey {
    /// Build the key for a host/service pair.
    pub fn new(host: &str, service_name: &str) -> Self {
        Self(format!("{host}:{service_name}"))
    }

    /// The joined key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last known value of a service, as held by the State Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub host: String,
    pub service_name: String,
    pub source: SourceKind,
    pub state: ServiceState,
    pub status: String,
}

impl From<&ServiceObservation> for ServiceRecord {
    fn from(obs: &ServiceObservation) -> Self {
        Self {
            host: obs.host.clone(),
            service_name: obs.service_name.clone(),
            source: obs.source,
            state: obs.state,
            status: obs.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_host_and_service() {
        let obs = ServiceObservation::new(
            "web-01",
            "nginx",
            SourceKind::Docker,
            ServiceState::Running,
            "Up",
        );
        assert_eq!(obs.key().as_str(), "web-01:nginx");
    }

    #[test]
    fn state_wire_names_are_stable() {
        assert_eq!(ServiceState::Running.as_str(), "running");
        assert_eq!(ServiceState::Stopped.as_str(), "stopped");
        assert_eq!(
            serde_json::to_string(&ServiceState::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&SourceKind::HealthApi).unwrap(),
            "\"health_api\""
        );
    }

    #[test]
    fn push_sources() {
        assert!(SourceKind::Docker.is_push());
        assert!(SourceKind::Systemd.is_push());
        assert!(!SourceKind::Agent.is_push());
        assert!(!SourceKind::HealthApi.is_push());
    }
}
