use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use super::DisplayState;
use crate::services::{topics, EventPayload};

/// Streams display snapshots, starting with the current one.
pub async fn sse_handler(
    State(state): State<DisplayState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.event_bus.subscribe(topics::DISPLAY).await;
    let current = Event::default()
        .event("display")
        .json_data(state.view.read().await.snapshot())
        .ok();

    let updates = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(EventPayload::Display(snapshot)) => Event::default().event("display").json_data(snapshot).ok(),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("display stream lagging: {}", e);
            None
        }
    });

    let stream = tokio_stream::iter(current).chain(updates).map(Ok);

    Sse::new(stream).keep_alive(KeepAlive::default())
}
