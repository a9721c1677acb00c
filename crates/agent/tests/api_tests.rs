//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mediation_agent::api::{create_router, AppState};
use mediation_lib::{
    build_topology,
    health::{components, HealthRegistry},
    observability::DiscoveryMetrics,
    EntityType,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let supply_chain = build_topology("IP").unwrap();
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;
    health_registry
        .supply_chain_registered(supply_chain.len())
        .await;
    let state = Arc::new(AppState::new(
        health_registry,
        DiscoveryMetrics::new(),
        supply_chain,
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["cluster_scraper"].is_object());
    assert!(health["components"]["supply_chain"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_metrics_source_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(components::METRICS_SOURCE, "metrics.k8s.io unavailable")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_discovery_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::DISCOVERY, "Failed to list pods")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_cycle() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reason"], "No discovery cycle has completed");
}

#[tokio::test]
async fn test_readyz_returns_ok_after_first_cycle() {
    let (app, state) = setup_test_app().await;
    state.health_registry.record_cycle_completed().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_healthz_reports_discovery_progress() {
    let (app, state) = setup_test_app().await;
    state.health_registry.record_cycle_completed().await;

    let (_, health) = get_json(app, "/healthz").await;

    assert_eq!(health["discovery"]["completed_cycles"], 1);
    assert_eq!(health["discovery"]["supply_chain_templates"], 7);
}

#[tokio::test]
async fn test_readyz_returns_503_when_unhealthy_after_cycle() {
    let (app, state) = setup_test_app().await;
    state.health_registry.record_cycle_completed().await;
    state
        .health_registry
        .set_unhealthy(components::CLUSTER_SCRAPER, "Failed")
        .await;

    let (status, _) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;
    state.metrics.observe_cycle_duration(0.25);
    state.metrics.record_cache_lookup(true);
    state.metrics.record_cache_lookup(false);
    state.metrics.set_entities_discovered(EntityType::ContainerSpec, 3);

    let (status, text) = get_text(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("mediation_discovery_cycle_seconds_bucket"));
    assert!(text.contains("mediation_discovery_cycle_seconds_count"));
    assert!(text.contains("mediation_ownership_cache_hits_total"));
    assert!(text.contains("mediation_ownership_cache_misses_total"));
    assert!(text.contains("entity_type=\"CONTAINER_SPEC\""));
}

#[tokio::test]
async fn test_supply_chain_endpoint_lists_templates() {
    let (app, _state) = setup_test_app().await;

    let (status, templates) = get_json(app, "/supplychain").await;

    assert_eq!(status, StatusCode::OK);
    let templates = templates.as_array().unwrap();
    assert_eq!(templates.len(), 7);

    let kinds: Vec<&str> = templates
        .iter()
        .map(|t| t["entity_type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"CONTAINER_SPEC"));
    assert!(kinds.contains(&"VIRTUAL_MACHINE"));

    let node = templates
        .iter()
        .find(|t| t["entity_type"] == "VIRTUAL_MACHINE")
        .unwrap();
    assert!(node["merged_entity_metadata"].is_object());
}
