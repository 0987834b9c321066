//! Message API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use parley_common::{ValidatedJson, ViewerId};
use parley_moderation::ContentModerator;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::ConversationsState;
use crate::domain::entities::{Message, MessageOrigin};
use crate::domain::error::ConversationResult;

/// Request for sending a message
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

/// Message response DTO
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub origin: MessageOrigin,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl MessageResponse {
    pub fn render(m: Message, moderator: &dyn ContentModerator) -> Self {
        Self {
            content: moderator.moderate(&m.content),
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            origin: m.origin,
            sequence: m.sequence,
            created_at: m.created_at,
        }
    }
}

/// Send a message to a conversation
pub async fn send_message(
    ViewerId(sender): ViewerId,
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> ConversationResult<(StatusCode, Json<MessageResponse>)> {
    let message = state
        .service
        .send_message(conversation_id, sender, &req.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::render(message, state.moderator())),
    ))
}

/// List messages for a conversation, oldest first
pub async fn list_messages(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<Uuid>,
) -> ConversationResult<Json<Vec<MessageResponse>>> {
    let messages = state.service.list_messages(conversation_id, viewer).await?;

    let moderator = state.moderator();
    let responses: Vec<MessageResponse> = messages
        .into_iter()
        .map(|m| MessageResponse::render(m, moderator))
        .collect();
    Ok(Json(responses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::MAX_MESSAGE_LENGTH;

    #[test]
    fn test_send_request_length_bounds() {
        let empty = SendMessageRequest {
            content: String::new(),
        };
        assert!(empty.validate().is_err());

        let max = SendMessageRequest {
            content: "a".repeat(MAX_MESSAGE_LENGTH),
        };
        assert!(max.validate().is_ok());

        let over = SendMessageRequest {
            content: "a".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(over.validate().is_err());
    }
}
