//! Axum web adapter for vigil.
//!
//! Serves the live event stream to viewers over WebSocket (`/api/events`)
//! and the last known state over JSON (`/api/services`, `/api/hosts`,
//! `/api/status`). [`bootstrap`] is the composition root for the whole
//! monitor.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings; these are used by tests/
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use serde_json as _;
#[cfg(test)]
use tower as _;
#[cfg(test)]
use tokio_tungstenite as _;
#[cfg(test)]
use vigil_client as _;

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod routes;
pub mod state;

// Re-export primary types
pub use bootstrap::{
    AxumContext, CorsConfig, DEFAULT_LISTEN, ServerConfig, bootstrap, bootstrap_with_watchers,
    serve, start_server,
};
pub use error::HttpError;
pub use hub::DistributionHub;
pub use routes::create_router;
pub use state::AppState;
