//! Lifecycle controller for the watcher set.
//!
//! The `MonitorSupervisor` owns every watcher task. All watchers share one
//! cancellation token; [`shutdown`](MonitorSupervisor::shutdown) fires it and
//! then joins every task, so nothing is left running when it returns.
//! Dropping a watcher's future closes the feed subscriptions and HTTP
//! clients it held.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigil_core::{ChangeDetector, Whitelist};

use crate::watcher::{SourceWatcher, WatcherContext};

/// Error from supervisor operations.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Watchers are already running.
    #[error("Watchers are already running ({0} tasks)")]
    AlreadyRunning(usize),

    /// The supervisor has been shut down and cannot be restarted.
    #[error("Supervisor has been shut down")]
    ShutDown,
}

struct WatcherTask {
    name: String,
    join_handle: JoinHandle<()>,
}

/// Starts and stops all watchers together.
///
/// # Example
///
/// ```ignore
/// let supervisor = MonitorSupervisor::new(detector, Arc::new(settings.whitelist()));
/// supervisor.start(build_watchers(&settings)).await?;
/// // ...
/// supervisor.shutdown().await;
/// ```
pub struct MonitorSupervisor {
    detector: ChangeDetector,
    whitelist: Arc<Whitelist>,
    cancel_token: CancellationToken,
    tasks: Mutex<Vec<WatcherTask>>,
}

impl MonitorSupervisor {
    #[must_use]
    pub fn new(detector: ChangeDetector, whitelist: Arc<Whitelist>) -> Self {
        Self {
            detector,
            whitelist,
            cancel_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn every watcher.
    ///
    /// Each watcher registers a discovery sweep before it is spawned; the
    /// gate is sealed once all are registered, so the discovery phase ends
    /// when the last first sweep completes (immediately if `watchers` is
    /// empty).
    ///
    /// # Errors
    ///
    /// Returns an error if watchers are already running or the supervisor
    /// has been shut down.
    pub async fn start(&self, watchers: Vec<SourceWatcher>) -> Result<usize, SupervisorError> {
        let mut tasks = self.tasks.lock().await;
        if self.cancel_token.is_cancelled() {
            return Err(SupervisorError::ShutDown);
        }
        if !tasks.is_empty() {
            return Err(SupervisorError::AlreadyRunning(tasks.len()));
        }

        let gate = self.detector.gate();
        for watcher in watchers {
            let name = watcher.name();
            let sweep = gate.register();
            let ctx = WatcherContext::new(
                self.detector.clone(),
                Arc::clone(&self.whitelist),
                self.cancel_token.clone(),
            );
            debug!(watcher = %name, "Spawning watcher");
            let join_handle = tokio::spawn(watcher.run(ctx, sweep));
            tasks.push(WatcherTask { name, join_handle });
        }
        gate.seal();

        info!(watchers = tasks.len(), "Monitor started");
        Ok(tasks.len())
    }

    /// Cancel every watcher and wait for all of them to exit.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        if tasks.is_empty() {
            return;
        }

        let count = tasks.len();
        for task in tasks {
            match task.join_handle.await {
                Ok(()) => debug!(watcher = %task.name, "Watcher exited"),
                Err(e) if e.is_panic() => error!(watcher = %task.name, "Watcher panicked: {e}"),
                Err(e) => debug!(watcher = %task.name, "Watcher task aborted: {e}"),
            }
        }
        info!(watchers = count, "Monitor stopped");
    }

    /// Number of watcher tasks still running.
    pub async fn running_watchers(&self) -> usize {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|t| !t.join_handle.is_finished())
            .count()
    }

    pub const fn detector(&self) -> &ChangeDetector {
        &self.detector
    }
}

impl std::fmt::Debug for MonitorSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSupervisor")
            .field("cancelled", &self.cancel_token.is_cancelled())
            .finish_non_exhaustive()
    }
}
