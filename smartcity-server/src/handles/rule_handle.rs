use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use smartcity_api::models::{RuleKind, RuleSet, RuleUpdate};

use crate::errors::ApiError;
use crate::services::DashboardHandle;

#[derive(Clone)]
pub struct RuleState {
    pub dashboard: DashboardHandle,
}

pub fn rule_router(rule_state: RuleState) -> Router {
    Router::new()
        .route("/api/rules", get(get_rules))
        .route("/api/rules/:kind", put(update_rule))
        .with_state(rule_state)
}

#[utoipa::path(
    get,
    path = "/api/rules",
    tag = "rule",
    responses(
        (status = 200, description = "Current rule parameters", body = RuleSet)
    )
)]
pub async fn get_rules(State(state): State<RuleState>) -> Result<Json<RuleSet>, ApiError> {
    Ok(Json(state.dashboard.snapshot().await?.rules))
}

#[utoipa::path(
    put,
    path = "/api/rules/{kind}",
    tag = "rule",
    params(
        ("kind" = RuleKind, Path, description = "lighting, irrigation, air_quality or noise")
    ),
    request_body = RuleUpdate,
    responses(
        (status = 200, description = "Rule updated, all sensors re-evaluated", body = RuleSet),
        (status = 400, description = "Parameter does not apply to this rule")
    )
)]
pub async fn update_rule(
    State(state): State<RuleState>,
    Path(kind): Path<RuleKind>,
    Json(body): Json<RuleUpdate>,
) -> Result<Json<RuleSet>, ApiError> {
    Ok(Json(state.dashboard.update_rule(kind, body).await?))
}
