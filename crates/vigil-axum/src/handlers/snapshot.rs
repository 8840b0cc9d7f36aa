//! Snapshot endpoints: last known state for freshly connected dashboards.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use vigil_core::{BusStats, HostRecord, ServiceRecord};

use crate::error::HttpError;
use crate::state::AppState;

/// Monitor overview returned by `GET /api/status`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub discovery_complete: bool,
    pub suppress_discovery: bool,
    pub watchers: usize,
    pub services: usize,
    pub hosts: usize,
    pub bus: BusStats,
}

/// `GET /api/services`
pub async fn services(State(state): State<AppState>) -> Json<Vec<ServiceRecord>> {
    Json(state.store.services())
}

/// `GET /api/hosts/{host}/services`
pub async fn host_services(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> Result<Json<Vec<ServiceRecord>>, HttpError> {
    let services: Vec<_> = state
        .store
        .services()
        .into_iter()
        .filter(|s| s.host == host)
        .collect();
    if services.is_empty() && state.store.host(&host).is_none() {
        return Err(HttpError::NotFound(format!("unknown host: {host}")));
    }
    Ok(Json(services))
}

/// `GET /api/hosts`
pub async fn hosts(State(state): State<AppState>) -> Json<Vec<HostRecord>> {
    Json(state.store.hosts())
}

/// `GET /api/hosts/{host}`
pub async fn host(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> Result<Json<HostRecord>, HttpError> {
    state
        .store
        .host(&host)
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("unknown host: {host}")))
}

/// `GET /api/status`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        discovery_complete: state.supervisor.detector().gate().is_complete(),
        suppress_discovery: state.settings.suppress_discovery,
        watchers: state.supervisor.running_watchers().await,
        services: state.store.service_count(),
        hosts: state.store.hosts().len(),
        bus: state.bus.stats(),
    })
}
