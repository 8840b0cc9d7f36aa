//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where the monitor is wired together for the
//! web adapter: store, bus, discovery gate, detector, watchers, supervisor
//! and hub are all instantiated here.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vigil_core::{
    ChangeDetector, DiscoveryGate, EventBus, MonitorSettings, StateStore, validate_settings,
};
use vigil_runtime::{MonitorSupervisor, SourceWatcher, build_watchers};

use crate::hub::DistributionHub;
use crate::routes::create_router;
use crate::state::AppState;

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:9750";

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// CORS configuration.
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            cors: CorsConfig::default(),
        }
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Settings the monitor was started with.
    pub settings: MonitorSettings,
    /// Last known state, read by the snapshot endpoints.
    pub store: Arc<StateStore>,
    /// Event bus the hub subscribes viewers to.
    pub bus: Arc<EventBus>,
    /// Owner of every watcher task.
    pub supervisor: Arc<MonitorSupervisor>,
    /// Per-viewer distribution.
    pub hub: DistributionHub,
    /// Fired when the server starts shutting down.
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for AxumContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxumContext")
            .field("hosts", &self.settings.hosts.len())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

/// Bootstrap the monitor with the watchers described by `settings`.
pub async fn bootstrap(settings: MonitorSettings) -> Result<AxumContext> {
    let watchers = build_watchers(&settings);
    bootstrap_with_watchers(settings, watchers).await
}

/// Bootstrap the monitor with an explicit watcher set.
pub async fn bootstrap_with_watchers(
    settings: MonitorSettings,
    watchers: Vec<SourceWatcher>,
) -> Result<AxumContext> {
    validate_settings(&settings)?;

    // 1. Shared state and fan-out
    let store = Arc::new(StateStore::new());
    let bus = Arc::new(EventBus::new(settings.subscriber_capacity));
    let gate = DiscoveryGate::new(settings.suppress_discovery);

    // 2. Detector publishes straight onto the bus
    let detector = ChangeDetector::new(Arc::clone(&store), bus.clone(), gate);

    // 3. Watchers
    let supervisor = Arc::new(MonitorSupervisor::new(
        detector,
        Arc::new(settings.whitelist()),
    ));
    let started = supervisor.start(watchers).await?;

    // 4. Hub
    let shutdown = CancellationToken::new();
    let hub = DistributionHub::new(
        Arc::clone(&bus),
        settings.ping_interval(),
        shutdown.clone(),
    );

    info!(
        hosts = settings.hosts.len(),
        watchers = started,
        poll_interval = ?settings.poll_interval(),
        suppress_discovery = settings.suppress_discovery,
        "Monitor bootstrapped"
    );

    Ok(AxumContext {
        settings,
        store,
        bus,
        supervisor,
        hub,
        shutdown,
    })
}

/// Serve `state` on an already-bound listener until `signal` resolves.
///
/// On shutdown viewers are closed, in-flight requests drain and then every
/// watcher is stopped and joined.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    cors: &CorsConfig,
    signal: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(Arc::clone(&state), cors);
    info!("vigil listening on http://{}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        signal.await;
        info!("Shutdown requested");
        shutdown.cancel();
    })
    .await?;

    state.supervisor.shutdown().await;
    Ok(())
}

/// Bootstrap and serve until `signal` resolves.
pub async fn start_server<F>(config: ServerConfig, settings: MonitorSettings, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Bind first so a busy port fails before any watcher starts.
    let listener = TcpListener::bind(config.listen).await?;
    let state = Arc::new(bootstrap(settings).await?);
    serve(listener, state, &config.cors, signal).await
}
