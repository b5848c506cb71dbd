use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use smartcity_api::models::{ActuatorStatus, Device, DeviceId, RuleSet, PUBLIC_LIGHTING};
use smartcity_api::store::{read_as, StateStore};
use tower::ServiceExt;

mod common;
use common::mock_app::MockApp;

async fn put_rule(app: &MockApp, kind: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(format!("/api/rules/{kind}"))
        .method(Method::PUT)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_get_rules() {
    let app = MockApp::new().await;

    let request = Request::builder()
        .uri("/api/rules")
        .method(Method::GET)
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rules: RuleSet = serde_json::from_slice(&body).unwrap();
    assert_eq!(rules, RuleSet::default());

    let stored = read_as::<RuleSet>(app.store.as_ref(), &app.paths.rules()).await.unwrap();
    assert_eq!(stored, Some(RuleSet::default()));
}

#[tokio::test]
async fn test_lower_threshold_reevaluates() {
    let app = MockApp::new().await;

    let (status, body) = put_rule(&app, "lighting", json!({ "threshold": 100.0 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lighting"]["threshold"], 100.0);
    assert_eq!(body["lighting"]["active"], true);

    let light = DeviceId::derive(PUBLIC_LIGHTING, "Parque Verde");
    let device = app
        .dashboard
        .snapshot()
        .await
        .unwrap()
        .devices
        .into_iter()
        .find(|device| device.id == light)
        .unwrap();
    assert_eq!(device.status(), Some(ActuatorStatus::On));

    let stored = app.store.read(&app.paths.rules()).await.unwrap().unwrap();
    assert_eq!(stored["lighting"]["threshold"], 100.0);
}

#[tokio::test]
async fn test_inactive_rule_is_skipped() {
    let app = MockApp::new().await;

    put_rule(&app, "lighting", json!({ "active": false })).await;
    let (status, _) = put_rule(&app, "lighting", json!({ "threshold": 50.0 })).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = app.dashboard.snapshot().await.unwrap();
    assert!(snapshot
        .devices
        .iter()
        .filter(|device| device.name == PUBLIC_LIGHTING)
        .all(|device| device.status() == Some(ActuatorStatus::Off)));
    assert!(!snapshot.rules.lighting.active);
}

#[tokio::test]
async fn test_air_quality_level() {
    let app = MockApp::new().await;

    let (status, body) = put_rule(&app, "air_quality", json!({ "level": "boa" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["airQuality"]["level"], "boa");

    let snapshot = app.dashboard.snapshot().await.unwrap();
    let alert = snapshot
        .devices
        .iter()
        .find(|device| device.id.as_str() == "AlertadePoluição_ZonaIndustrial")
        .and_then(Device::status);
    assert_eq!(alert, Some(ActuatorStatus::On));
    assert_eq!(snapshot.alerts.len(), 1);
}

#[tokio::test]
async fn test_mismatched_parameter() {
    let app = MockApp::new().await;

    let (status, body) = put_rule(&app, "air_quality", json!({ "threshold": 3.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 400);

    let (status, _) = put_rule(&app, "noise", json!({ "level": "má" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let snapshot = app.dashboard.snapshot().await.unwrap();
    assert_eq!(snapshot.rules, RuleSet::default());
}
