//! Server-sent event stream of session changes

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::ApiState;
use crate::session::SessionEvent;

/// Build events router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/events", get(events)).with_state(state)
}

/// GET /api/events
async fn events(
    State(state): State<Arc<ApiState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.controller.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(
        |result: Result<SessionEvent, BroadcastStreamRecvError>| match result {
            Ok(event) => to_sse(&event).map(Ok),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event subscriber lagged");
                None
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &SessionEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().data(json)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode session event");
            None
        }
    }
}
