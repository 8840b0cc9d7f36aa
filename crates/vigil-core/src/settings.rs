//! Monitor settings and validation.
//!
//! Settings are loaded by the binary (JSON file plus CLI overrides) and
//! consumed read-only by everything else. These are pure domain types with
//! no infrastructure dependencies.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::domain::SourceKind;

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default delay before a dropped event feed is re-opened.
pub const DEFAULT_FEED_RETRY_DELAY_SECS: u64 = 5;

/// Default deadline for a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Default idle time after which the hub pings a viewer.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

/// One monitored host on one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name used in events and the dashboard.
    pub name: String,
    /// Backend the host is watched through.
    pub backend: SourceKind,
    /// Remote address: passed to the CLI for push backends, polled as the
    /// base URL for HTTP backends.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Whitelist of services/units to watch. Empty watches everything.
    #[serde(default)]
    pub services: Vec<String>,
}

impl HostConfig {
    /// Create a host entry without endpoint or whitelist.
    pub fn new(name: impl Into<String>, backend: SourceKind) -> Self {
        Self {
            name: name.into(),
            backend,
            endpoint: None,
            services: Vec::new(),
        }
    }

    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the service whitelist.
    #[must_use]
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }
}

/// Monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Hold back events until every watcher has finished its first sweep.
    pub suppress_discovery: bool,
    /// Seconds to wait before re-opening a failed event feed.
    pub feed_retry_delay_secs: u64,
    /// Deadline, in seconds, for a single provider call.
    pub provider_timeout_secs: u64,
    /// Per-subscriber event queue capacity.
    pub subscriber_capacity: usize,
    /// Seconds of outbound silence before the hub pings a viewer.
    pub ping_interval_secs: u64,
    /// Monitored hosts.
    pub hosts: Vec<HostConfig>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            suppress_discovery: true,
            feed_retry_delay_secs: DEFAULT_FEED_RETRY_DELAY_SECS,
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            hosts: Vec::new(),
        }
    }
}

impl MonitorSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn feed_retry_delay(&self) -> Duration {
        Duration::from_secs(self.feed_retry_delay_secs)
    }

    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Hosts watched through `backend`.
    pub fn hosts_for(&self, backend: SourceKind) -> impl Iterator<Item = &HostConfig> {
        self.hosts.iter().filter(move |h| h.backend == backend)
    }

    /// Build the per-host whitelist.
    pub fn whitelist(&self) -> Whitelist {
        let mut allowed: HashMap<String, HashSet<String>> = HashMap::new();
        for host in &self.hosts {
            if !host.services.is_empty() {
                allowed
                    .entry(host.name.clone())
                    .or_default()
                    .extend(host.services.iter().cloned());
            }
        }
        Whitelist { allowed }
    }
}

/// Per-host set of services to watch.
///
/// Hosts without an entry watch everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    allowed: HashMap<String, HashSet<String>>,
}

impl Whitelist {
    /// A whitelist that allows everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `service` on `host` should be watched.
    pub fn allows(&self, host: &str, service: &str) -> bool {
        self.allowed
            .get(host)
            .is_none_or(|services| services.contains(service))
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to parse settings: {0}")]
    Parse(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("Host name cannot be empty")]
    EmptyHostName,

    #[error("Host {name} is configured twice for backend {backend}")]
    DuplicateHost { name: String, backend: SourceKind },

    #[error("Host {0} uses an HTTP backend but has no endpoint")]
    MissingEndpoint(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &MonitorSettings) -> Result<(), SettingsError> {
    let positive = [
        ("poll_interval_secs", settings.poll_interval_secs),
        ("feed_retry_delay_secs", settings.feed_retry_delay_secs),
        ("provider_timeout_secs", settings.provider_timeout_secs),
        ("ping_interval_secs", settings.ping_interval_secs),
        ("subscriber_capacity", settings.subscriber_capacity as u64),
    ];
    if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
        return Err(SettingsError::Zero { field });
    }

    let mut seen = HashSet::new();
    for host in &settings.hosts {
        if host.name.trim().is_empty() {
            return Err(SettingsError::EmptyHostName);
        }
        if !seen.insert((host.name.as_str(), host.backend)) {
            return Err(SettingsError::DuplicateHost {
                name: host.name.clone(),
                backend: host.backend,
            });
        }
        if !host.backend.is_push()
            && host.endpoint.as_ref().is_none_or(|e| e.trim().is_empty())
        {
            return Err(SettingsError::MissingEndpoint(host.name.clone()));
        }
    }

    Ok(())
}
