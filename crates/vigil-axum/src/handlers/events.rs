//! `GET /api/events`: WebSocket upgrade for the live event stream.
//!
//! The connection is server-to-viewer only. Every text frame holds one or
//! more newline-separated wire messages; `ping` messages are sent when the
//! stream has been idle for the configured ping interval.

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;

use crate::error::HttpError;
use crate::state::AppState;

pub async fn stream(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    if state.shutdown.is_cancelled() {
        return Err(HttpError::ServiceUnavailable(
            "server is shutting down".to_string(),
        ));
    }

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        hub.serve_viewer(socket, addr.to_string()).await;
    }))
}
