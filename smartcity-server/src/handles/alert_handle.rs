use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use smartcity_api::models::{Alert, DeviceId};

use crate::errors::ApiError;
use crate::services::DashboardHandle;

#[derive(Clone)]
pub struct AlertState {
    pub dashboard: DashboardHandle,
}

pub fn alert_router(alert_state: AlertState) -> Router {
    Router::new()
        .route("/api/alerts", get(get_alerts))
        .route("/api/alerts/:device_id/dismiss", post(dismiss_alert))
        .with_state(alert_state)
}

#[utoipa::path(
    get,
    path = "/api/alerts",
    tag = "alert",
    responses(
        (status = 200, description = "Active alerts, dismissed ones included", body = Vec<Alert>)
    )
)]
pub async fn get_alerts(State(state): State<AlertState>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.dashboard.snapshot().await?.alerts))
}

#[utoipa::path(
    post,
    path = "/api/alerts/{device_id}/dismiss",
    tag = "alert",
    params(
        ("device_id" = String, Path, description = "Actuator that raised the alert")
    ),
    responses(
        (status = 200, description = "Notice hidden until the next announcement", body = Alert),
        (status = 404, description = "No active alert for this device")
    )
)]
pub async fn dismiss_alert(
    State(state): State<AlertState>,
    Path(device_id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.dashboard.dismiss_alert(DeviceId::from(device_id)).await?))
}
