//! Change feed over Server-Sent Events

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use parley_common::ViewerId;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::api::middleware::ConversationsState;
use crate::domain::error::ConversationResult;
use crate::realtime::{ChangeEvent, EventScope};

/// Clients treat this as "re-fetch, you missed events"
const LAGGED_EVENT: &str = "lagged";

fn change_stream(
    mut rx: broadcast::Receiver<ChangeEvent>,
    scope: EventScope,
) -> impl futures_core::Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(change) => match Event::default().event(change.name()).json_data(&change) {
                    Ok(event) => yield Ok(event),
                    Err(e) => {
                        tracing::error!(error = %e, scope = %scope, "Failed to encode change event");
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, scope = %scope, "Change feed subscriber lagged");
                    yield Ok(Event::default().event(LAGGED_EVENT).data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Directory feed: every change to the caller's conversations
pub async fn viewer_events(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let scope = EventScope::Viewer(viewer);
    let rx = state.service.hub().subscribe(scope).await;

    tracing::debug!(scope = %scope, "Change feed subscribed");
    Sse::new(change_stream(rx, scope)).keep_alive(KeepAlive::default())
}

/// Transcript feed: new messages of one conversation
pub async fn conversation_events(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<Uuid>,
) -> ConversationResult<Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>>> {
    let conversation = state
        .service
        .get_conversation(conversation_id, viewer)
        .await?;
    conversation.ensure_active()?;

    let scope = EventScope::Conversation(conversation_id);
    let rx = state.service.hub().subscribe(scope).await;

    tracing::debug!(scope = %scope, "Change feed subscribed");
    Ok(Sse::new(change_stream(rx, scope)).keep_alive(KeepAlive::default()))
}
