//! Shared write path for messages: store, then announce

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entities::{Conversation, Message, MessageDraft};
use crate::domain::error::{ConversationError, ConversationResult};
use crate::realtime::EventHub;
use crate::repository::{AppendOutcome, MessageStore};

#[derive(Clone)]
pub struct MessageDelivery {
    messages: Arc<dyn MessageStore>,
    hub: EventHub,
}

impl MessageDelivery {
    pub fn new(messages: Arc<dyn MessageStore>, hub: EventHub) -> Self {
        Self { messages, hub }
    }

    /// Append a draft and publish the resulting changes.
    ///
    /// Fails with `SendRejected` when the conversation was soft-deleted
    /// before the append committed; nothing is stored in that case.
    pub async fn deliver(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> ConversationResult<(Message, Conversation)> {
        let origin = draft.origin;

        match self.messages.append(conversation_id, draft).await? {
            AppendOutcome::Appended {
                message,
                conversation,
            } => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    message_id = %message.id,
                    sequence = message.sequence,
                    origin = %origin,
                    "Message appended"
                );
                self.hub.publish_message(&message).await;
                self.hub.publish_conversation(&conversation).await;
                Ok((message, conversation))
            }
            AppendOutcome::ConversationMissing => Err(ConversationError::NotFound),
            AppendOutcome::ConversationDeleted => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    origin = %origin,
                    "Message rejected: conversation was removed"
                );
                Err(ConversationError::SendRejected)
            }
        }
    }
}
