//! Route definitions and router construction.

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(handlers::snapshot::services))
        .route("/hosts", get(handlers::snapshot::hosts))
        .route("/hosts/{host}", get(handlers::snapshot::host))
        .route(
            "/hosts/{host}/services",
            get(handlers::snapshot::host_services),
        )
        .route("/status", get(handlers::snapshot::status))
        .route("/events", get(handlers::events::stream))
}

/// Create the main router.
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api_routes())
        .layer(build_cors_layer(cors))
        .with_state(state)
}
