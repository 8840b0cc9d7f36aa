//! Router wiring for the snapshot endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use vigil_axum::{AppState, CorsConfig, create_router};
use vigil_core::MonitorSettings;

async fn get(state: &AppState, uri: &str) -> (StatusCode, Vec<u8>) {
    let app = create_router(state.clone(), &CorsConfig::AllowAll);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(state, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn seeded() -> AppState {
    let state = common::context(MonitorSettings::default()).await;
    common::seed(&state);
    state
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let state = common::context(MonitorSettings::default()).await;
    let (status, body) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn services_lists_every_known_service() {
    let state = seeded().await;
    let (status, body) = get_json(&state, "/api/services").await;

    assert_eq!(status, StatusCode::OK);
    let services = body.as_array().unwrap();
    assert_eq!(services.len(), 2);
    let nginx = services
        .iter()
        .find(|s| s["serviceName"] == "nginx")
        .unwrap();
    assert_eq!(nginx["host"], "web-01");
    assert_eq!(nginx["source"], "docker");
    assert_eq!(nginx["state"], "running");
    assert_eq!(nginx["status"], "Up 2 hours");
}

#[tokio::test]
async fn services_is_empty_before_any_observation() {
    let state = common::context(MonitorSettings::default()).await;
    let (status, body) = get_json(&state, "/api/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(Vec::new()));
}

#[tokio::test]
async fn host_reports_reachability() {
    let state = seeded().await;

    let (status, body) = get_json(&state, "/api/hosts/db-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reachable"], false);
    assert_eq!(body["lastError"], "connection refused");

    let (_, hosts) = get_json(&state, "/api/hosts").await;
    assert_eq!(hosts.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_host_is_not_found() {
    let state = seeded().await;

    for uri in ["/api/hosts/ghost", "/api/hosts/ghost/services"] {
        let (status, body) = get_json(&state, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"], "unknown host: ghost");
    }
}

#[tokio::test]
async fn host_services_filters_by_host() {
    let state = seeded().await;

    let (status, body) = get_json(&state, "/api/hosts/web-01/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Known host without services.
    let (status, body) = get_json(&state, "/api/hosts/db-01/services").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(Vec::new()));
}

#[tokio::test]
async fn status_summarises_the_monitor() {
    let state = seeded().await;
    let _viewer = state.bus.subscribe("probe");

    let (status, body) = get_json(&state, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discoveryComplete"], true);
    assert_eq!(body["suppressDiscovery"], true);
    assert_eq!(body["watchers"], 0);
    assert_eq!(body["services"], 2);
    assert_eq!(body["hosts"], 2);
    assert_eq!(body["bus"]["subscribers"], 1);
    assert_eq!(body["bus"]["published"], 0);
}

#[tokio::test]
async fn cors_preflight_allows_listed_origin() {
    let state = common::context(MonitorSettings::default()).await;
    let cors = CorsConfig::AllowOrigins(vec!["http://dashboard.local".to_string()]);
    let app = create_router(state, &cors);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/services")
                .header("origin", "http://dashboard.local")
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://dashboard.local"
    );
}
