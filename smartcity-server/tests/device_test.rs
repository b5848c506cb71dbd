use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use smartcity_api::models::{ActuatorStatus, DeviceId, PUBLIC_LIGHTING, SECURITY_CAMERAS};
use smartcity_api::store::StateStore;
use tower::ServiceExt;
use utoipa::PartialSchema;

mod common;
use common::mock_app::{eventually, uri_segment, MockApp};

async fn send(app: &MockApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .method(method)
        .header("Content-Type", "application/json")
        .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_get_devices() {
    let app = MockApp::new().await;

    let (status, body) = send(&app, Method::GET, "/api/devices", None).await;

    assert_eq!(status, StatusCode::OK);
    let devices = body.as_array().unwrap();
    assert_eq!(devices.len(), 5);
    assert!(devices.iter().any(|device| {
        device["id"] == "IluminaçãoPública_ParqueVerde" && device["status"] == "Desligado"
    }));
}

#[tokio::test]
async fn test_create_device() {
    let app = MockApp::new().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({ "kind": "actuator", "name": SECURITY_CAMERAS, "zone": "Centro Histórico" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "CâmarasdeSegurança_CentroHistórico");
    assert_eq!(body["status"], "Desligado");
    assert_eq!(body["icon"], "bi bi-camera-video");

    let id = DeviceId::derive(SECURITY_CAMERAS, "Centro Histórico");
    let record = app.store.read(&app.paths.actuator(&id)).await.unwrap().unwrap();
    assert_eq!(record["zoneId"], "centro-histórico");
}

#[tokio::test]
async fn test_create_duplicate_device() {
    let app = MockApp::new().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({ "kind": "actuator", "name": PUBLIC_LIGHTING, "zone": "Parque Verde" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 409);
}

#[tokio::test]
async fn test_create_device_without_zone() {
    let app = MockApp::new().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/devices",
        Some(json!({ "kind": "sensor", "name": "Temperatura", "zone": "  " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_toggle_device() {
    let app = MockApp::new().await;
    let id = DeviceId::derive(PUBLIC_LIGHTING, "Parque Verde");
    let uri = format!("/api/devices/{}/toggle", uri_segment(id.as_str()));

    let (status, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Ligado");

    let path = app.paths.actuator(&id);
    assert_eq!(app.store.field_writes(&path), 1);
    assert_eq!(app.store.read(&path).await.unwrap().unwrap()["status"], "Ligado");

    let (_, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(body["status"], "Desligado");
}

#[tokio::test]
async fn test_toggle_sensor() {
    let app = MockApp::new().await;

    let (status, _) = send(&app, Method::POST, "/api/devices/Luminosidade_ParqueVerde/toggle", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_device_status() {
    let app = MockApp::new().await;
    let id = DeviceId::derive(PUBLIC_LIGHTING, "Parque Verde");
    let uri = format!("/api/devices/{}/status", uri_segment(id.as_str()));

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "status": "Ativo" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Ligado");

    let (status, _) = send(&app, Method::PUT, &uri, Some(json!({ "status": "Meio" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_offline_rejects_manual_switch() {
    let app = MockApp::offline().await;
    let uri = format!(
        "/api/devices/{}/toggle",
        uri_segment(DeviceId::derive(PUBLIC_LIGHTING, "Parque Verde").as_str())
    );

    let (status, body) = send(&app, Method::POST, &uri, None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], 503);
}

#[tokio::test]
async fn test_delete_device() {
    let app = MockApp::new().await;
    let id = DeviceId::derive(PUBLIC_LIGHTING, "Parque Verde");
    let uri = format!("/api/devices/{}", uri_segment(id.as_str()));

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], PUBLIC_LIGHTING);
    assert!(app.store.read(&app.paths.actuator(&id)).await.unwrap().is_none());

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (view, id) = (&app.view, &id);
    assert!(eventually(move || async move { view.read().await.rows().iter().all(|row| row.id != id.as_str()) }).await);
}

#[test]
fn test_status_schema_matches_wire_format() {
    let schema = serde_json::to_value(ActuatorStatus::schema()).unwrap();

    assert_eq!(schema["enum"], json!(["Ligado", "Desligado"]));
    assert_eq!(serde_json::to_value(ActuatorStatus::On).unwrap(), json!("Ligado"));
}
