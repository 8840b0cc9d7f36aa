use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, warn};
use vigil_core::SweepToken;

use super::WatcherContext;
use crate::feeds::{EventFeed, FeedError, FeedStream};

/// Follows a live event feed for one host.
///
/// Startup: one discovery sweep, then subscribe. On any feed failure the
/// host is reported unreachable, the watcher waits `retry_delay` and
/// re-subscribes; a successful re-subscribe reports the host reachable and
/// re-runs the sweep to pick up transitions missed while disconnected.
pub struct PushWatcher {
    feed: Arc<dyn EventFeed>,
    retry_delay: Duration,
}

impl fmt::Debug for PushWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushWatcher")
            .field("host", &self.feed.host())
            .field("source", &self.feed.source())
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl PushWatcher {
    pub fn new(feed: Arc<dyn EventFeed>, retry_delay: Duration) -> Self {
        Self { feed, retry_delay }
    }

    pub fn name(&self) -> String {
        format!("{}@{}", self.feed.source(), self.feed.host())
    }

    pub(super) async fn run(self, ctx: &WatcherContext, sweep: SweepToken) {
        let host = self.feed.host();
        let source = self.feed.source();
        info!(host, %source, "Push watcher started");

        let mut synced = tokio::select! {
            () = ctx.cancelled() => {
                info!(host, %source, "Push watcher stopped");
                return;
            }
            synced = self.sweep(ctx) => synced,
        };
        sweep.complete();

        loop {
            let opened = tokio::select! {
                () = ctx.cancelled() => break,
                opened = self.feed.subscribe() => opened,
            };

            match opened {
                Ok(stream) => {
                    ctx.report_host(host, Ok(()));
                    if !synced {
                        debug!(host, %source, "Resyncing after reconnect");
                        tokio::select! {
                            () = ctx.cancelled() => break,
                            _ = self.sweep(ctx) => {}
                        }
                    }
                    match self.follow(ctx, stream).await {
                        Some(e) => {
                            warn!(host, %source, error = %e, "Event feed dropped");
                            ctx.report_host(host, Err(&e.to_string()));
                        }
                        None => break,
                    }
                    synced = false;
                }
                Err(e) => {
                    warn!(host, %source, error = %e, "Failed to open event feed");
                    ctx.report_host(host, Err(&e.to_string()));
                }
            }

            tokio::select! {
                () = ctx.cancelled() => break,
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        info!(host, %source, "Push watcher stopped");
    }

    /// Enumerate every current service. Returns whether it succeeded.
    async fn sweep(&self, ctx: &WatcherContext) -> bool {
        let host = self.feed.host();
        match self.feed.discover().await {
            Ok(services) => {
                debug!(host, source = %self.feed.source(), count = services.len(), "Sweep complete");
                ctx.report_host(host, Ok(()));
                ctx.observe_all(&services);
                true
            }
            Err(e) => {
                warn!(host, source = %self.feed.source(), error = %e, "Sweep failed");
                ctx.report_host(host, Err(&e.to_string()));
                false
            }
        }
    }

    /// Apply feed events until the feed fails (returns the error) or the
    /// watcher is cancelled (returns `None`).
    async fn follow(&self, ctx: &WatcherContext, mut stream: FeedStream) -> Option<FeedError> {
        loop {
            tokio::select! {
                () = ctx.cancelled() => return None,
                item = stream.next() => match item {
                    Some(Ok(obs)) => ctx.observe(&obs),
                    Some(Err(e)) => return Some(e),
                    None => return Some(FeedError::Closed),
                },
            }
        }
    }
}
