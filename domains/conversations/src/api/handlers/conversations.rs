//! Conversation API handlers

use axum::{
    body::Bytes,
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
use crate::domain::entities::{Conversation, Directory, Topic, TopicContext};
use crate::domain::error::{ConversationError, ConversationResult};

/// Request for contacting someone about a listing
#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    /// The listing owner or inquirer on the other side
    #[validate(custom(function = "validate_participant_id", message = "Missing participant"))]
    pub other_participant_id: Uuid,

    #[validate(custom(function = "validate_listing_id", message = "Missing listing"))]
    pub topic: Topic,
}

/// Context for reviving a removed conversation
#[derive(Debug, Deserialize, Validate)]
pub struct ReviveRequest {
    #[validate(custom(function = "validate_participant_id", message = "Missing participant"))]
    pub other_participant_id: Uuid,
    #[validate(custom(function = "validate_listing_id", message = "Missing listing"))]
    pub topic: Topic,
}

fn validate_participant_id(id: &Uuid) -> std::result::Result<(), validator::ValidationError> {
    if id.is_nil() {
        return Err(validator::ValidationError::new("nil_id"));
    }
    Ok(())
}

fn validate_listing_id(topic: &Topic) -> std::result::Result<(), validator::ValidationError> {
    validate_participant_id(&topic.id())
}

#[derive(Debug, Serialize)]
pub struct LastMessageResponse {
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub sender_id: Uuid,
}

/// Conversation response DTO, rendered for one viewer
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    /// The participant who is not the viewer
    pub counterpart_id: Option<Uuid>,
    pub topic: Topic,
    pub last_message: Option<LastMessageResponse>,
    pub unread: bool,
    /// Whether the newest message is waiting for this viewer
    pub unread_for_viewer: bool,
    pub soft_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationResponse {
    pub fn render(c: Conversation, viewer: Uuid, moderator: &dyn ContentModerator) -> Self {
        Self {
            counterpart_id: c.counterpart_of(viewer),
            unread_for_viewer: c.is_unread_for(viewer),
            id: c.id,
            participant_a: c.participant_a,
            participant_b: c.participant_b,
            topic: c.topic,
            last_message: c.last_message.map(|m| LastMessageResponse {
                content: moderator.moderate(&m.content),
                sent_at: m.sent_at,
                sender_id: m.sender_id,
            }),
            unread: c.unread,
            soft_deleted: c.soft_deleted,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Directory response: conversations grouped by listing kind
#[derive(Debug, Serialize)]
pub struct DirectoryResponse {
    pub spaces: Vec<ConversationResponse>,
    pub vendors: Vec<ConversationResponse>,
}

impl DirectoryResponse {
    fn render(directory: Directory, viewer: Uuid, moderator: &dyn ContentModerator) -> Self {
        let render_all = |items: Vec<Conversation>| -> Vec<ConversationResponse> {
            items
                .into_iter()
                .map(|c| ConversationResponse::render(c, viewer, moderator))
                .collect()
        };
        Self {
            spaces: render_all(directory.spaces),
            vendors: render_all(directory.vendors),
        }
    }
}

/// Open (find or create) the conversation about a listing.
///
/// 201 when created, 200 when it already existed.
pub async fn contact(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    ValidatedJson(req): ValidatedJson<ContactRequest>,
) -> ConversationResult<(StatusCode, Json<ConversationResponse>)> {
    let resolution = state
        .service
        .resolve_or_create(viewer, req.other_participant_id, req.topic)
        .await?;

    let status = if resolution.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ConversationResponse::render(
            resolution.conversation,
            viewer,
            state.moderator(),
        )),
    ))
}

/// List the caller's active conversations, split by listing kind
pub async fn list_conversations(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
) -> ConversationResult<Json<DirectoryResponse>> {
    let directory = state.service.directory(viewer).await?;
    Ok(Json(DirectoryResponse::render(
        directory,
        viewer,
        state.moderator(),
    )))
}

pub async fn get_conversation(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
) -> ConversationResult<Json<ConversationResponse>> {
    let conversation = state.service.get_conversation(id, viewer).await?;
    Ok(Json(ConversationResponse::render(
        conversation,
        viewer,
        state.moderator(),
    )))
}

/// Mark the newest message read
pub async fn mark_read(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
) -> ConversationResult<Json<ConversationResponse>> {
    let conversation = state.service.mark_read(id, viewer).await?;
    Ok(Json(ConversationResponse::render(
        conversation,
        viewer,
        state.moderator(),
    )))
}

/// Soft-delete a conversation for both participants
pub async fn delete_conversation(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
) -> ConversationResult<StatusCode> {
    state.service.soft_delete(id, viewer).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revive a removed conversation. Without a body the conversation stays gone.
pub async fn revive_conversation(
    ViewerId(viewer): ViewerId,
    State(state): State<ConversationsState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ConversationResult<(StatusCode, Json<ConversationResponse>)> {
    let context = parse_revive_body(&body)?.map(|req| TopicContext {
        participant_self: viewer,
        participant_other: req.other_participant_id,
        topic: req.topic,
    });

    let resolution = state.service.revive(id, viewer, context).await?;

    let status = if resolution.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ConversationResponse::render(
            resolution.conversation,
            viewer,
            state.moderator(),
        )),
    ))
}

/// An empty body means "no context"
fn parse_revive_body(body: &[u8]) -> ConversationResult<Option<ReviveRequest>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: ReviveRequest = serde_json::from_slice(body)
        .map_err(|e| ConversationError::Validation(format!("Invalid revive context: {}", e)))?;
    request
        .validate()
        .map_err(|e| ConversationError::Validation(format!("Invalid revive context: {}", e)))?;
    Ok(Some(request))
}
