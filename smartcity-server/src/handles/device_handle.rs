use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use smartcity_api::models::{ActuatorStatus, Device, DeviceId, NewDevice};
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::services::DashboardHandle;

#[derive(Clone)]
pub struct DeviceState {
    pub dashboard: DashboardHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusBody {
    /// `Ligado`/`Desligado`; `On`/`Off` and `Ativo` are accepted too
    pub status: ActuatorStatus,
}

pub fn device_router(device_state: DeviceState) -> Router {
    Router::new()
        .route("/api/devices", get(get_devices).post(create_device))
        .route("/api/devices/:device_id", delete(delete_device))
        .route("/api/devices/:device_id/toggle", post(toggle_device))
        .route("/api/devices/:device_id/status", put(update_device_status))
        .with_state(device_state)
}

#[utoipa::path(
    get,
    path = "/api/devices",
    tag = "device",
    responses(
        (status = 200, description = "All known devices", body = Vec<Device>)
    )
)]
pub async fn get_devices(State(state): State<DeviceState>) -> Result<Json<Vec<Device>>, ApiError> {
    Ok(Json(state.dashboard.snapshot().await?.devices))
}

#[utoipa::path(
    post,
    path = "/api/devices",
    tag = "device",
    request_body = NewDevice,
    responses(
        (status = 201, description = "Device created", body = Device),
        (status = 400, description = "Name or zone missing"),
        (status = 409, description = "Same name already exists in the zone")
    )
)]
pub async fn create_device(
    State(state): State<DeviceState>,
    Json(body): Json<NewDevice>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let device = state.dashboard.add_device(body).await?;

    Ok((StatusCode::CREATED, Json(device)))
}

#[utoipa::path(
    delete,
    path = "/api/devices/{device_id}",
    tag = "device",
    params(
        ("device_id" = String, Path, description = "Device ID")
    ),
    responses(
        (status = 200, description = "Device removed", body = Device),
        (status = 404, description = "Device not found")
    )
)]
pub async fn delete_device(
    State(state): State<DeviceState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(state.dashboard.remove_device(DeviceId::from(device_id)).await?))
}

#[utoipa::path(
    post,
    path = "/api/devices/{device_id}/toggle",
    tag = "device",
    params(
        ("device_id" = String, Path, description = "Actuator ID")
    ),
    responses(
        (status = 200, description = "Actuator toggled", body = Device),
        (status = 400, description = "Device is not an actuator"),
        (status = 404, description = "Device not found"),
        (status = 503, description = "System is offline")
    )
)]
pub async fn toggle_device(
    State(state): State<DeviceState>,
    Path(device_id): Path<String>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(
        state.dashboard.set_actuator(DeviceId::from(device_id), None).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/devices/{device_id}/status",
    tag = "device",
    params(
        ("device_id" = String, Path, description = "Actuator ID")
    ),
    request_body = StatusBody,
    responses(
        (status = 200, description = "Actuator status set", body = Device),
        (status = 400, description = "Device is not an actuator"),
        (status = 404, description = "Device not found"),
        (status = 503, description = "System is offline")
    )
)]
pub async fn update_device_status(
    State(state): State<DeviceState>,
    Path(device_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Device>, ApiError> {
    Ok(Json(
        state
            .dashboard
            .set_actuator(DeviceId::from(device_id), Some(body.status))
            .await?,
    ))
}
