//! Find-or-create for conversations
//!
//! At most one live conversation exists per unordered participant pair and
//! topic. The store enforces that with a uniqueness constraint; the resolver
//! turns a lost creation race into a lookup of the winner's row.

use std::sync::Arc;

use parley_common::RepositoryError;
use uuid::Uuid;

use crate::domain::entities::{Conversation, PairKey, Topic, TopicContext};
use crate::domain::error::{ConversationError, ConversationResult};
use crate::repository::ConversationStore;

/// Attempts before a persistent create/lookup mismatch is reported
const MAX_CREATE_ATTEMPTS: usize = 3;

/// A resolved conversation and whether this call created it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub conversation: Conversation,
    pub created: bool,
}

impl Resolution {
    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }
}

#[derive(Clone)]
pub struct ConversationResolver {
    store: Arc<dyn ConversationStore>,
}

impl ConversationResolver {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Return the live conversation for the pair and topic, creating it if
    /// none exists. Callers racing on the same key all get the same row.
    pub async fn resolve_or_create(
        &self,
        participant_self: Uuid,
        participant_other: Uuid,
        topic: Topic,
    ) -> ConversationResult<Resolution> {
        let pair = PairKey::new(participant_self, participant_other)?;

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            if let Some(existing) = self.store.find_active(pair, topic).await? {
                return Ok(Resolution {
                    conversation: existing,
                    created: false,
                });
            }

            let candidate = Conversation::new(participant_self, participant_other, topic)?;
            match self.store.insert(&candidate).await {
                Ok(conversation) => {
                    tracing::info!(
                        conversation_id = %conversation.id,
                        topic_kind = %topic.kind(),
                        topic_id = %topic.id(),
                        "Conversation created"
                    );
                    return Ok(Resolution {
                        conversation,
                        created: true,
                    });
                }
                Err(RepositoryError::AlreadyExists) => {
                    tracing::debug!(
                        attempt,
                        topic_id = %topic.id(),
                        "Lost conversation creation race, re-reading"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        // The winner's row vanished between our insert and re-read every time
        tracing::warn!(
            topic_id = %topic.id(),
            attempts = MAX_CREATE_ATTEMPTS,
            "Could not settle conversation for pair and topic"
        );
        Err(ConversationError::Repository(RepositoryError::Unavailable(
            "conversation creation did not settle".to_string(),
        )))
    }

    /// Resolve a fresh conversation to replace a soft-deleted one.
    ///
    /// Without a context there is nothing to revive from and the old
    /// conversation stays gone. A context must describe the same pair and
    /// topic as the removed conversation.
    pub async fn revive(
        &self,
        conversation_id: Uuid,
        context: Option<TopicContext>,
    ) -> ConversationResult<Resolution> {
        let previous = self
            .store
            .find(conversation_id)
            .await?
            .ok_or(ConversationError::NotFound)?;

        if !previous.soft_deleted {
            return Ok(Resolution {
                conversation: previous,
                created: false,
            });
        }

        let Some(context) = context else {
            return Err(ConversationError::Gone);
        };

        let requested = PairKey::new(context.participant_self, context.participant_other)?;
        if requested != previous.pair_key() || context.topic != previous.topic {
            return Err(ConversationError::Validation(
                "Context does not match the removed conversation".to_string(),
            ));
        }

        let resolution = self
            .resolve_or_create(
                context.participant_self,
                context.participant_other,
                context.topic,
            )
            .await?;

        tracing::info!(
            previous_id = %conversation_id,
            conversation_id = %resolution.conversation.id,
            created = resolution.created,
            "Conversation revived"
        );

        Ok(resolution)
    }
}
