//! Ask endpoint streaming the answer as server-sent events

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{AnswerEvent, AskRequest};

/// Encode one answer event as an SSE frame
pub fn to_sse_event(event: &AnswerEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to serialize answer event: {}", e);
            Event::default().event("error").data("failed to serialize event")
        })
}

/// POST /api/ask - Ask a question about an uploaded document
///
/// Errors before the answer starts (unknown document, embedding failure,
/// generation refused) are returned as JSON error responses.
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let answer = state.pipeline().ask(&request).await?;

    tracing::info!(
        "Streaming answer for {} with context pages {:?}",
        request.document_id,
        answer.ranked_pages
    );

    let document_id = request.document_id;
    let stream = answer.events.map(move |event| {
        if event.is_terminal() {
            tracing::info!("Answer stream for {} ended with '{}'", document_id, event.name());
        }
        Ok::<_, Infallible>(to_sse_event(&event))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
