//! Shared helpers for vigil-axum integration tests.

use std::sync::Arc;

use vigil_axum::{AppState, bootstrap_with_watchers};
use vigil_core::{MonitorSettings, ServiceObservation, ServiceState, SourceKind};

/// A monitor with no watchers, so discovery ends as soon as it starts.
pub async fn context(settings: MonitorSettings) -> AppState {
    Arc::new(
        bootstrap_with_watchers(settings, Vec::new())
            .await
            .expect("bootstrap"),
    )
}

/// Seed the store the way watchers would: two services on a reachable host
/// and one unreachable host.
#[allow(dead_code)]
pub fn seed(state: &AppState) {
    let detector = state.supervisor.detector();
    detector.report_host("web-01", Ok(()));
    detector.report_host("db-01", Err("connection refused"));
    for (name, running) in [("nginx", true), ("worker", false)] {
        detector.observe(&ServiceObservation::new(
            "web-01",
            name,
            SourceKind::Docker,
            ServiceState::from_running(running),
            if running { "Up 2 hours" } else { "Exited (1)" },
        ));
    }
}
