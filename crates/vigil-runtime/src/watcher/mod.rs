//! Source watchers.
//!
//! A watcher runs for the lifetime of the monitor, turns one source's native
//! signal into [`ServiceObservation`]s and host health reports, and hands
//! both to the shared [`ChangeDetector`]. It never publishes events itself.
//!
//! Watchers are a tagged enum rather than a trait object: the two variants
//! differ only in how they obtain observations.
//!
//! - [`PushWatcher`]: sweep once, then follow a live [`EventFeed`](crate::feeds::EventFeed),
//!   re-opening it after a fixed delay when it fails.
//! - [`PollWatcher`]: query a [`ServiceProvider`](vigil_core::ServiceProvider)
//!   for every host on a fixed interval. The first cycle is the sweep.

mod factory;
mod poll;
mod push;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vigil_core::{ChangeDetector, ServiceObservation, SweepToken, Whitelist};

pub use factory::build_watchers;
pub use poll::PollWatcher;
pub use push::PushWatcher;

/// Everything a running watcher shares with the rest of the monitor.
#[derive(Debug, Clone)]
pub struct WatcherContext {
    detector: ChangeDetector,
    whitelist: Arc<Whitelist>,
    cancel: CancellationToken,
}

impl WatcherContext {
    pub fn new(
        detector: ChangeDetector,
        whitelist: Arc<Whitelist>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            detector,
            whitelist,
            cancel,
        }
    }

    /// Forward an observation unless the whitelist excludes it.
    fn observe(&self, obs: &ServiceObservation) {
        if self.whitelist.allows(&obs.host, &obs.service_name) {
            self.detector.observe(obs);
        }
    }

    fn observe_all(&self, observations: &[ServiceObservation]) {
        for obs in observations {
            self.observe(obs);
        }
    }

    fn report_host(&self, host: &str, outcome: Result<(), &str>) {
        self.detector.report_host(host, outcome);
    }

    fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// A concurrent worker for one event source.
#[derive(Debug)]
pub enum SourceWatcher {
    Push(PushWatcher),
    Poll(PollWatcher),
}

impl SourceWatcher {
    /// Name used for logs and the supervisor's task list.
    pub fn name(&self) -> String {
        match self {
            Self::Push(w) => w.name(),
            Self::Poll(w) => w.name(),
        }
    }

    /// Run until `ctx`'s cancellation token fires.
    ///
    /// `sweep` is completed once the first full sweep is done, whether or
    /// not it succeeded.
    pub async fn run(self, ctx: WatcherContext, sweep: SweepToken) {
        match self {
            Self::Push(w) => w.run(&ctx, sweep).await,
            Self::Poll(w) => w.run(&ctx, sweep).await,
        }
    }
}

impl From<PushWatcher> for SourceWatcher {
    fn from(watcher: PushWatcher) -> Self {
        Self::Push(watcher)
    }
}

impl From<PollWatcher> for SourceWatcher {
    fn from(watcher: PollWatcher) -> Self {
        Self::Poll(watcher)
    }
}
