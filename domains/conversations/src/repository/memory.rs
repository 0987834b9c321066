//! In-memory store for local development and tests
//!
//! One mutex guards conversations and messages together, which gives the
//! same atomicity and uniqueness guarantees the Postgres schema enforces.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use parley_common::RepositoryError;
use uuid::Uuid;

use super::{AppendOutcome, ConversationStore, MessageStore, RepositoryResult};
use crate::domain::entities::{Conversation, Message, MessageDraft, PairKey, Topic};

#[derive(Default)]
struct Tables {
    conversations: HashMap<Uuid, Conversation>,
    /// Messages per conversation, in append order
    messages: HashMap<Uuid, Vec<Message>>,
}

impl Tables {
    fn active_for(&self, pair: PairKey, topic: Topic) -> Option<&Conversation> {
        self.conversations
            .values()
            .find(|c| !c.soft_deleted && c.topic == topic && c.pair_key() == pair)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> RepositoryResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| RepositoryError::Unavailable(format!("in-memory store poisoned: {e}")))
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Conversation>> {
        Ok(self.tables()?.conversations.get(&id).cloned())
    }

    async fn find_active(
        &self,
        pair: PairKey,
        topic: Topic,
    ) -> RepositoryResult<Option<Conversation>> {
        Ok(self.tables()?.active_for(pair, topic).cloned())
    }

    async fn insert(&self, conversation: &Conversation) -> RepositoryResult<Conversation> {
        let mut tables = self.tables()?;

        if tables.conversations.contains_key(&conversation.id) {
            return Err(RepositoryError::AlreadyExists);
        }
        if !conversation.soft_deleted
            && tables
                .active_for(conversation.pair_key(), conversation.topic)
                .is_some()
        {
            return Err(RepositoryError::AlreadyExists);
        }

        tables
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation.clone())
    }

    async fn mark_read(&self, id: Uuid, viewer: Uuid) -> RepositoryResult<Option<Conversation>> {
        let mut tables = self.tables()?;
        let Some(conversation) = tables.conversations.get_mut(&id) else {
            return Ok(None);
        };
        if conversation.soft_deleted {
            return Ok(None);
        }

        match conversation.acknowledge(viewer) {
            Ok(true) => Ok(Some(conversation.clone())),
            Ok(false) | Err(_) => Ok(None),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Option<Conversation>> {
        let mut tables = self.tables()?;
        let Some(conversation) = tables.conversations.get_mut(&id) else {
            return Ok(None);
        };

        match conversation.soft_delete() {
            Ok(()) => Ok(Some(conversation.clone())),
            Err(_) => Ok(None),
        }
    }

    async fn list_for_participant(&self, user_id: Uuid) -> RepositoryResult<Vec<Conversation>> {
        let tables = self.tables()?;
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|c| !c.soft_deleted && c.is_participant(user_id))
            .cloned()
            .collect();

        conversations.sort_by(|a, b| {
            b.last_activity_at()
                .cmp(&a.last_activity_at())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(conversations)
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> RepositoryResult<AppendOutcome> {
        let mut guard = self.tables()?;
        let tables = &mut *guard;

        let Some(conversation) = tables.conversations.get_mut(&conversation_id) else {
            return Ok(AppendOutcome::ConversationMissing);
        };
        if conversation.soft_deleted {
            return Ok(AppendOutcome::ConversationDeleted);
        }

        let history = tables.messages.entry(conversation_id).or_default();
        let sequence = history.last().map_or(1, |m| m.sequence + 1);
        let now = chrono::Utc::now();
        let created_at = match history.last() {
            Some(previous) if previous.created_at > now => previous.created_at,
            _ => now,
        };

        let message = draft.into_message(conversation_id, sequence, created_at);
        conversation
            .record_message(&message)
            .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;
        history.push(message.clone());

        Ok(AppendOutcome::Appended {
            message,
            conversation: conversation.clone(),
        })
    }

    async fn list_by_conversation(&self, conversation_id: Uuid) -> RepositoryResult<Vec<Message>> {
        Ok(self
            .tables()?
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Message>> {
        Ok(self
            .tables()?
            .messages
            .values()
            .flatten()
            .find(|m| m.id == id)
            .cloned())
    }
}
