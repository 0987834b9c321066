//! State machine for conversation lifecycle
//!
//! Conversation states: Active → SoftDeleted (terminal)
//!
//! Appending a message and clearing the unread flag are self-transitions of
//! Active; a soft-deleted conversation accepts no events at all.

pub use parley_common::StateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Active,
    SoftDeleted,
}

impl ConversationState {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [ConversationState] {
        match self {
            Self::Active => &[Self::Active, Self::SoftDeleted],
            Self::SoftDeleted => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SoftDeleted)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::SoftDeleted => write!(f, "soft_deleted"),
        }
    }
}

/// Events that act on a conversation's lifecycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConversationEvent {
    /// A message was appended
    AppendMessage,
    /// The recipient read the newest message
    MarkRead,
    /// A participant removed the conversation
    SoftDelete,
}

impl std::fmt::Display for ConversationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AppendMessage => write!(f, "append_message"),
            Self::MarkRead => write!(f, "mark_read"),
            Self::SoftDelete => write!(f, "soft_delete"),
        }
    }
}

/// Conversation state machine
pub struct ConversationStateMachine;

impl ConversationStateMachine {
    /// Attempt a state transition
    pub fn transition(
        current: ConversationState,
        event: ConversationEvent,
    ) -> Result<ConversationState, StateError> {
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let next = match event {
            ConversationEvent::AppendMessage | ConversationEvent::MarkRead => {
                ConversationState::Active
            }
            ConversationEvent::SoftDelete => ConversationState::SoftDeleted,
        };

        Ok(next)
    }

    /// Check whether an event applies in the given state
    pub fn can_apply(current: ConversationState, event: ConversationEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
