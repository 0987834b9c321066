//! Storage ports and adapters for the Conversations domain
//!
//! The service layer depends only on [`ConversationStore`] and
//! [`MessageStore`]. Postgres backs production; the in-memory store backs
//! local development and tests.

pub mod conversations;
pub mod memory;
pub mod messages;

use std::sync::Arc;

use async_trait::async_trait;
use parley_common::RepositoryError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{Conversation, Message, MessageDraft, PairKey, Topic};

pub use conversations::PgConversationStore;
pub use memory::InMemoryStore;
pub use messages::PgMessageStore;

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Persistence for conversation rows
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Conversation>>;

    /// The live conversation for a pair and topic, if any
    async fn find_active(&self, pair: PairKey, topic: Topic)
        -> RepositoryResult<Option<Conversation>>;

    /// Insert a new conversation.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] when a live conversation
    /// for the same pair and topic already exists.
    async fn insert(&self, conversation: &Conversation) -> RepositoryResult<Conversation>;

    /// Clear the unread flag on behalf of `viewer`.
    ///
    /// Returns the updated row, or `None` when nothing changed (already read,
    /// the viewer sent the newest message, removed, or missing).
    async fn mark_read(&self, id: Uuid, viewer: Uuid) -> RepositoryResult<Option<Conversation>>;

    /// Flip an active conversation to soft-deleted.
    ///
    /// Returns the updated row, or `None` when it was already removed or missing.
    async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Option<Conversation>>;

    /// Active conversations of a participant, most recent activity first
    async fn list_for_participant(&self, user_id: Uuid) -> RepositoryResult<Vec<Conversation>>;
}

/// Result of appending a message
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Stored; the conversation snapshot now points at the message
    Appended {
        message: Message,
        conversation: Conversation,
    },
    ConversationMissing,
    /// The conversation was soft-deleted; nothing was written
    ConversationDeleted,
}

/// Persistence for messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message and update the owning conversation's snapshot and
    /// unread flag as one atomic step. Only active conversations accept
    /// messages.
    async fn append(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> RepositoryResult<AppendOutcome>;

    /// Every message of a conversation, oldest first
    async fn list_by_conversation(&self, conversation_id: Uuid) -> RepositoryResult<Vec<Message>>;

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Message>>;
}

/// Combined store access for the Conversations domain
#[derive(Clone)]
pub struct ConversationsRepositories {
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl ConversationsRepositories {
    pub fn new(conversations: Arc<dyn ConversationStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self {
            conversations,
            messages,
        }
    }

    /// Postgres-backed stores sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PgConversationStore::new(pool.clone())),
            Arc::new(PgMessageStore::new(pool)),
        )
    }

    /// Process-local stores sharing one in-memory table set
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store)
    }
}
