use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use smartcity_api::models::Weather;

use crate::errors::{ApiError, WeatherError};
use crate::services::WeatherService;

#[derive(Clone)]
pub struct WeatherState {
    pub weather_service: Option<Arc<WeatherService>>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

pub fn weather_router(weather_state: WeatherState) -> Router {
    Router::new()
        .route("/api/weather", get(get_weather))
        .with_state(weather_state)
}

#[utoipa::path(
    get,
    path = "/api/weather",
    tag = "weather",
    params(
        ("city" = Option<String>, Query, description = "City name, the configured city when absent")
    ),
    responses(
        (status = 200, description = "Current conditions", body = Weather),
        (status = 404, description = "Lookup not configured or city unknown"),
        (status = 502, description = "Weather service failed")
    )
)]
pub async fn get_weather(
    State(state): State<WeatherState>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<Weather>, ApiError> {
    let service = state.weather_service.ok_or(WeatherError::NotConfigured)?;

    Ok(Json(service.lookup(query.city.as_deref()).await?))
}
