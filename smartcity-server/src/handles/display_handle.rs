use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::RwLock;

use super::sse_handler;
use crate::services::{DisplaySnapshot, DisplayView, EventBus};

#[derive(Clone)]
pub struct DisplayState {
    pub view: Arc<RwLock<DisplayView>>,
    pub event_bus: Arc<EventBus>,
}

pub fn display_router(display_state: DisplayState) -> Router {
    Router::new()
        .route("/api/display", get(get_display))
        .route("/api/events", get(sse_handler))
        .with_state(display_state)
}

#[utoipa::path(
    get,
    path = "/api/display",
    tag = "display",
    responses(
        (status = 200, description = "Device table and shown alerts as the store reports them", body = DisplaySnapshot)
    )
)]
pub async fn get_display(State(state): State<DisplayState>) -> Json<DisplaySnapshot> {
    Json(state.view.read().await.snapshot())
}
