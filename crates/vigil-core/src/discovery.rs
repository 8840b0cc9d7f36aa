//! Discovery phase tracking.
//!
//! While the monitor is in its discovery phase, observations seed the State
//! Store but transitions are not published. The phase ends once every
//! registered watcher has completed its first sweep, and never restarts.
//!
//! Events are held back globally until *all* watchers are done, so a watcher
//! that finishes early does not publish while a slower one is still sweeping.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Default)]
struct GateState {
    pending: usize,
    sealed: bool,
}

/// One-way flag marking the end of the discovery phase.
#[derive(Debug)]
pub struct DiscoveryGate {
    suppress: bool,
    state: Mutex<GateState>,
    complete: watch::Sender<bool>,
}

impl DiscoveryGate {
    /// Create a gate.
    ///
    /// With `suppress == false` the gate still tracks sweeps but
    /// [`in_discovery`](Self::in_discovery) is always `false`.
    pub fn new(suppress: bool) -> Arc<Self> {
        let (complete, _) = watch::channel(false);
        Arc::new(Self {
            suppress,
            state: Mutex::new(GateState::default()),
            complete,
        })
    }

    /// Register a watcher whose first sweep must complete before the phase ends.
    pub fn register(self: &Arc<Self>) -> SweepToken {
        if self.is_complete() {
            return SweepToken { gate: None };
        }
        self.lock().pending += 1;
        SweepToken {
            gate: Some(Arc::clone(self)),
        }
    }

    /// Declare that no more watchers will register.
    ///
    /// The phase can only end after sealing; if every registered sweep is
    /// already done it ends immediately.
    pub fn seal(&self) {
        let mut state = self.lock();
        state.sealed = true;
        if state.pending == 0 {
            self.finish();
        }
    }

    /// Whether events are currently being held back.
    pub fn in_discovery(&self) -> bool {
        self.suppress && !self.is_complete()
    }

    /// Whether every registered sweep has completed.
    pub fn is_complete(&self) -> bool {
        *self.complete.borrow()
    }

    /// Wait until the discovery phase has ended.
    pub async fn wait_complete(&self) {
        let mut rx = self.complete.subscribe();
        // The sender lives as long as `self`, so this can only fail if the
        // gate is dropped while we wait on it, which `&self` rules out.
        let _ = rx.wait_for(|complete| *complete).await;
    }

    fn sweep_done(&self) {
        let mut state = self.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.sealed && state.pending == 0 {
            self.finish();
        }
    }

    fn finish(&self) {
        let was_complete = self.complete.send_replace(true);
        if !was_complete {
            info!(suppressed = self.suppress, "Discovery phase complete");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that a watcher still owes its first sweep.
///
/// Completing (or dropping) the token counts the sweep as done, so a watcher
/// that exits early never holds the phase open.
#[derive(Debug)]
#[must_use = "dropping a sweep token completes the sweep immediately"]
pub struct SweepToken {
    gate: Option<Arc<DiscoveryGate>>,
}

impl SweepToken {
    /// Mark this watcher's first sweep as complete.
    pub fn complete(mut self) {
        self.release();
    }

    /// Whether this token still counts against the gate.
    pub const fn is_pending(&self) -> bool {
        self.gate.is_some()
    }

    fn release(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.sweep_done();
        }
    }
}

impl Drop for SweepToken {
    fn drop(&mut self) {
        self.release();
    }
}
