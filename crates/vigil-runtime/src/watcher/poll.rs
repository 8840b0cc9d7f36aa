use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use vigil_core::{ServiceProvider, SweepToken};

use super::WatcherContext;

/// Periodically fetches the service list of every host through a provider.
///
/// Hosts are fetched concurrently within a cycle; one host failing only
/// marks that host unreachable. Ticks missed because a cycle overran are
/// skipped rather than bunched up.
pub struct PollWatcher {
    provider: Arc<dyn ServiceProvider>,
    hosts: Vec<String>,
    interval: Duration,
    timeout: Duration,
}

impl fmt::Debug for PollWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollWatcher")
            .field("source", &self.provider.source())
            .field("hosts", &self.hosts)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PollWatcher {
    /// Create a poller.
    ///
    /// # Arguments
    ///
    /// * `provider` - Source of current service lists
    /// * `hosts` - Hosts to fetch every cycle
    /// * `interval` - Time between cycle starts
    /// * `timeout` - Deadline for each provider call
    pub fn new(
        provider: Arc<dyn ServiceProvider>,
        hosts: Vec<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            hosts,
            interval,
            timeout,
        }
    }

    pub fn name(&self) -> String {
        format!("{} poller", self.provider.source())
    }

    pub(super) async fn run(self, ctx: &WatcherContext, sweep: SweepToken) {
        let source = self.provider.source();
        info!(%source, hosts = self.hosts.len(), interval = ?self.interval, "Poll watcher started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep = Some(sweep);

        loop {
            tokio::select! {
                () = ctx.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        () = ctx.cancelled() => break,
                        () = self.poll_once(ctx) => {}
                    }
                    if let Some(token) = sweep.take() {
                        debug!(%source, "First poll cycle complete");
                        token.complete();
                    }
                }
            }
        }

        info!(%source, "Poll watcher stopped");
    }

    async fn poll_once(&self, ctx: &WatcherContext) {
        let deadline = Instant::now() + self.timeout;
        join_all(self.hosts.iter().map(|host| self.poll_host(ctx, host, deadline))).await;
    }

    async fn poll_host(&self, ctx: &WatcherContext, host: &str, deadline: Instant) {
        match self.provider.get_services(host, deadline).await {
            Ok(services) => {
                debug!(host, source = %self.provider.source(), count = services.len(), "Poll succeeded");
                ctx.report_host(host, Ok(()));
                ctx.observe_all(&services);
            }
            Err(e) => {
                warn!(host, source = %self.provider.source(), error = %e, "Poll failed");
                ctx.report_host(host, Err(&e.to_string()));
            }
        }
    }
}
