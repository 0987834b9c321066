//! Error types for the Conversations domain

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_common::{error_response, RepositoryError, StateError};

pub type ConversationResult<T> = std::result::Result<T, ConversationError>;

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("Conversation not found")]
    NotFound,

    #[error("Conversation has been removed")]
    Gone,

    #[error("Message not sent: the conversation was removed")]
    SendRejected,

    #[error("Caller is not a participant of this conversation")]
    NotParticipant,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid lifecycle transition: {0}")]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ConversationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Outsiders learn nothing about conversations they are not part of
            ConversationError::NotFound | ConversationError::NotParticipant => {
                StatusCode::NOT_FOUND
            }
            ConversationError::Gone => StatusCode::GONE,
            ConversationError::SendRejected | ConversationError::State(_) => StatusCode::CONFLICT,
            ConversationError::Validation(_) => StatusCode::BAD_REQUEST,
            ConversationError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ConversationError::NotFound | ConversationError::NotParticipant => {
                "CONVERSATION_NOT_FOUND"
            }
            ConversationError::Gone => "CONVERSATION_GONE",
            ConversationError::SendRejected => "SEND_REJECTED",
            ConversationError::Validation(_) => "VALIDATION_ERROR",
            ConversationError::State(_) => "INVALID_TRANSITION",
            ConversationError::Repository(_) => "STORAGE_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            ConversationError::NotParticipant => ConversationError::NotFound.to_string(),
            ConversationError::Repository(_) => "Internal storage error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ConversationError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Conversations storage failure");
        }

        error_response(status, self.error_code(), self.public_message())
    }
}
