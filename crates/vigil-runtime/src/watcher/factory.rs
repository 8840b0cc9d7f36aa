//! Builds the watcher set described by the settings.

use std::sync::Arc;

use vigil_core::{MonitorSettings, SourceKind};

use super::{PollWatcher, PushWatcher, SourceWatcher};
use crate::feeds::{DockerFeed, EventFeed, SystemdFeed};
use crate::providers::HttpServiceProvider;

/// One push watcher per Docker or systemd host, plus one poll watcher per
/// HTTP backend covering all of that backend's hosts.
pub fn build_watchers(settings: &MonitorSettings) -> Vec<SourceWatcher> {
    let mut watchers = Vec::new();

    for host in &settings.hosts {
        let feed: Arc<dyn EventFeed> = match host.backend {
            SourceKind::Docker => Arc::new(DockerFeed::new(&host.name, host.endpoint.clone())),
            SourceKind::Systemd => Arc::new(SystemdFeed::new(&host.name, host.endpoint.clone())),
            SourceKind::Agent | SourceKind::HealthApi => continue,
        };
        watchers.push(PushWatcher::new(feed, settings.feed_retry_delay()).into());
    }

    for source in [SourceKind::Agent, SourceKind::HealthApi] {
        let endpoints: Vec<(String, String)> = settings
            .hosts_for(source)
            .filter_map(|h| Some((h.name.clone(), h.endpoint.clone()?)))
            .collect();
        if endpoints.is_empty() {
            continue;
        }
        let hosts = endpoints.iter().map(|(name, _)| name.clone()).collect();
        let provider = Arc::new(HttpServiceProvider::new(source, endpoints));
        watchers.push(
            PollWatcher::new(
                provider,
                hosts,
                settings.poll_interval(),
                settings.provider_timeout(),
            )
            .into(),
        );
    }

    watchers
}
