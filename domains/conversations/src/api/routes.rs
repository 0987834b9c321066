//! Route definitions for Conversations domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{conversations, events, messages};
use super::middleware::ConversationsState;

/// Create conversation routes
fn conversation_routes() -> Router<ConversationsState> {
    Router::new()
        .route(
            "/v1/conversations",
            get(conversations::list_conversations).post(conversations::contact),
        )
        .route(
            "/v1/conversations/{id}",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route("/v1/conversations/{id}/read", post(conversations::mark_read))
        .route(
            "/v1/conversations/{id}/revive",
            post(conversations::revive_conversation),
        )
}

/// Create message routes
fn message_routes() -> Router<ConversationsState> {
    Router::new().route(
        "/v1/conversations/{id}/messages",
        get(messages::list_messages).post(messages::send_message),
    )
}

/// Create change feed routes
fn event_routes() -> Router<ConversationsState> {
    Router::new()
        .route("/v1/conversations/events", get(events::viewer_events))
        .route(
            "/v1/conversations/{id}/messages/events",
            get(events::conversation_events),
        )
}

/// Create all Conversations domain API routes
pub fn routes() -> Router<ConversationsState> {
    Router::new()
        .merge(conversation_routes())
        .merge(message_routes())
        .merge(event_routes())
}
