//! Conversation operations on behalf of an authenticated participant

use std::sync::Arc;

use parley_moderation::ContentModerator;
use uuid::Uuid;

use super::auto_responder::AutoResponderTrigger;
use super::delivery::MessageDelivery;
use super::resolver::{ConversationResolver, Resolution};
use crate::domain::entities::{Conversation, Directory, Message, MessageDraft, Topic, TopicContext};
use crate::domain::error::{ConversationError, ConversationResult};
use crate::realtime::EventHub;
use crate::repository::{ConversationStore, ConversationsRepositories, MessageStore};

pub struct MessagingService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    resolver: ConversationResolver,
    delivery: MessageDelivery,
    moderator: Arc<dyn ContentModerator>,
    hub: EventHub,
    auto_responder: Option<AutoResponderTrigger>,
}

impl MessagingService {
    pub fn new(
        repos: ConversationsRepositories,
        moderator: Arc<dyn ContentModerator>,
        hub: EventHub,
    ) -> Self {
        Self {
            resolver: ConversationResolver::new(repos.conversations.clone()),
            delivery: MessageDelivery::new(repos.messages.clone(), hub.clone()),
            conversations: repos.conversations,
            messages: repos.messages,
            moderator,
            hub,
            auto_responder: None,
        }
    }

    /// Enable automated replies for messages sent through this service
    pub fn with_auto_responder(mut self, trigger: AutoResponderTrigger) -> Self {
        self.auto_responder = Some(trigger);
        self
    }

    /// Write path shared with the auto-responder
    pub fn delivery(&self) -> MessageDelivery {
        self.delivery.clone()
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn moderator(&self) -> &Arc<dyn ContentModerator> {
        &self.moderator
    }

    /// Contact the other participant about a listing
    pub async fn resolve_or_create(
        &self,
        participant_self: Uuid,
        participant_other: Uuid,
        topic: Topic,
    ) -> ConversationResult<Resolution> {
        let resolution = self
            .resolver
            .resolve_or_create(participant_self, participant_other, topic)
            .await?;

        if resolution.created {
            self.hub.publish_conversation(&resolution.conversation).await;
        }
        Ok(resolution)
    }

    /// Start over after a conversation was soft-deleted.
    ///
    /// The caller must have been a participant. A context carrying only the
    /// other participant and topic is completed with the caller's id.
    pub async fn revive(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
        context: Option<TopicContext>,
    ) -> ConversationResult<Resolution> {
        let previous = self.load_for(conversation_id, viewer).await?;

        if let Some(ctx) = &context {
            if ctx.participant_self != viewer {
                return Err(ConversationError::Validation(
                    "Context must be expressed from the caller's side".to_string(),
                ));
            }
        }

        let resolution = self.resolver.revive(previous.id, context).await?;
        if resolution.created {
            self.hub.publish_conversation(&resolution.conversation).await;
        }
        Ok(resolution)
    }

    /// A conversation the viewer participates in, including soft-deleted ones
    pub async fn get_conversation(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> ConversationResult<Conversation> {
        self.load_for(conversation_id, viewer).await
    }

    /// Send a message as `sender`.
    ///
    /// Content is validated before moderation and stored moderated. An
    /// automated reply is requested only after the message has committed and
    /// never delays the return.
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender: Uuid,
        raw_content: &str,
    ) -> ConversationResult<Message> {
        let conversation = self.load_for(conversation_id, sender).await?;
        conversation.ensure_active()?;

        Message::validate_content(raw_content)?;
        let content = self.moderator.moderate(raw_content);

        let (message, _) = self
            .delivery
            .deliver(conversation.id, MessageDraft::human(sender, content))
            .await?;

        if let Some(trigger) = &self.auto_responder {
            trigger.trigger(conversation.id, message.id);
        }

        Ok(message)
    }

    /// Mark the newest message as read by `viewer`.
    ///
    /// No-op when the viewer sent it or it is already read; no event is
    /// published in that case.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> ConversationResult<Conversation> {
        let conversation = self.load_for(conversation_id, viewer).await?;
        conversation.ensure_active()?;

        if !conversation.is_unread_for(viewer) {
            return Ok(conversation);
        }

        match self.conversations.mark_read(conversation_id, viewer).await? {
            Some(updated) => {
                tracing::debug!(conversation_id = %conversation_id, "Conversation marked read");
                self.hub.publish_conversation(&updated).await;
                Ok(updated)
            }
            // Lost a race with another writer; report the current row
            None => self.load_for(conversation_id, viewer).await,
        }
    }

    /// Remove a conversation for both participants. Idempotent.
    pub async fn soft_delete(
        &self,
        conversation_id: Uuid,
        requester: Uuid,
    ) -> ConversationResult<Conversation> {
        let conversation = self.load_for(conversation_id, requester).await?;
        if conversation.soft_deleted {
            return Ok(conversation);
        }

        match self.conversations.soft_delete(conversation_id).await? {
            Some(deleted) => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    requested_by = %requester,
                    "Conversation soft-deleted"
                );
                self.hub.publish_conversation(&deleted).await;
                Ok(deleted)
            }
            None => self.load_for(conversation_id, requester).await,
        }
    }

    /// Full history, oldest first. Still readable after soft delete.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> ConversationResult<Vec<Message>> {
        self.load_for(conversation_id, viewer).await?;
        Ok(self.messages.list_by_conversation(conversation_id).await?)
    }

    /// The viewer's active conversations split by topic kind, most recent first
    pub async fn directory(&self, viewer: Uuid) -> ConversationResult<Directory> {
        let conversations = self.conversations.list_for_participant(viewer).await?;
        Ok(Directory::partition(conversations.iter()))
    }

    async fn load_for(
        &self,
        conversation_id: Uuid,
        viewer: Uuid,
    ) -> ConversationResult<Conversation> {
        let conversation = self
            .conversations
            .find(conversation_id)
            .await?
            .ok_or(ConversationError::NotFound)?;
        conversation.ensure_participant(viewer)?;
        Ok(conversation)
    }
}
