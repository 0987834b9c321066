//! Postgres conversation store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_common::RepositoryError;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ConversationStore, RepositoryResult};
use crate::domain::entities::{Conversation, LastMessage, PairKey, Topic, TopicKind};

pub(crate) const CONVERSATION_COLUMNS: &str = "id, participant_a, participant_b, topic_kind, \
    topic_id, last_message_content, last_message_sent_at, last_message_sender_id, unread, \
    soft_deleted, created_at, updated_at";

/// Strictly increasing `updated_at`, even for writes inside one transaction
pub(crate) const NEXT_UPDATED_AT: &str =
    "GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond')";

/// Flat row shape of the `conversations` table
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ConversationRow {
    id: Uuid,
    participant_a: Uuid,
    participant_b: Uuid,
    topic_kind: TopicKind,
    topic_id: Uuid,
    last_message_content: Option<String>,
    last_message_sent_at: Option<DateTime<Utc>>,
    last_message_sender_id: Option<Uuid>,
    unread: bool,
    soft_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = RepositoryError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let last_message = match (
            row.last_message_content,
            row.last_message_sent_at,
            row.last_message_sender_id,
        ) {
            (Some(content), Some(sent_at), Some(sender_id)) => Some(LastMessage {
                content,
                sent_at,
                sender_id,
            }),
            (None, None, None) => None,
            _ => {
                return Err(RepositoryError::InvalidData(format!(
                    "conversation {} has a partial last-message snapshot",
                    row.id
                )))
            }
        };

        Ok(Conversation {
            id: row.id,
            participant_a: row.participant_a,
            participant_b: row.participant_b,
            topic: Topic::from_parts(row.topic_kind, row.topic_id),
            created_at: row.created_at,
            last_message,
            unread: row.unread,
            soft_deleted: row.soft_deleted,
            updated_at: row.updated_at,
        })
    }
}

fn into_conversation(row: Option<ConversationRow>) -> RepositoryResult<Option<Conversation>> {
    row.map(Conversation::try_from).transpose()
}

#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Conversation>> {
        let query = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1");
        let row = sqlx::query_as::<_, ConversationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        into_conversation(row)
    }

    async fn find_active(
        &self,
        pair: PairKey,
        topic: Topic,
    ) -> RepositoryResult<Option<Conversation>> {
        let query = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE participant_low = $1 AND participant_high = $2 \
               AND topic_kind = $3 AND topic_id = $4 AND NOT soft_deleted"
        );
        let row = sqlx::query_as::<_, ConversationRow>(&query)
            .bind(pair.low())
            .bind(pair.high())
            .bind(topic.kind())
            .bind(topic.id())
            .fetch_optional(&self.pool)
            .await?;

        into_conversation(row)
    }

    async fn insert(&self, conversation: &Conversation) -> RepositoryResult<Conversation> {
        let query = format!(
            "INSERT INTO conversations ({CONVERSATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {CONVERSATION_COLUMNS}"
        );
        let snapshot = conversation.last_message.as_ref();
        let row = sqlx::query_as::<_, ConversationRow>(&query)
            .bind(conversation.id)
            .bind(conversation.participant_a)
            .bind(conversation.participant_b)
            .bind(conversation.topic.kind())
            .bind(conversation.topic.id())
            .bind(snapshot.map(|m| m.content.clone()))
            .bind(snapshot.map(|m| m.sent_at))
            .bind(snapshot.map(|m| m.sender_id))
            .bind(conversation.unread)
            .bind(conversation.soft_deleted)
            .bind(conversation.created_at)
            .bind(conversation.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from_write)?;

        Conversation::try_from(row)
    }

    async fn mark_read(&self, id: Uuid, viewer: Uuid) -> RepositoryResult<Option<Conversation>> {
        let query = format!(
            "UPDATE conversations SET unread = FALSE, updated_at = {NEXT_UPDATED_AT} \
             WHERE id = $1 AND unread AND NOT soft_deleted AND last_message_sender_id <> $2 \
             RETURNING {CONVERSATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ConversationRow>(&query)
            .bind(id)
            .bind(viewer)
            .fetch_optional(&self.pool)
            .await?;

        into_conversation(row)
    }

    async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Option<Conversation>> {
        let query = format!(
            "UPDATE conversations SET soft_deleted = TRUE, updated_at = {NEXT_UPDATED_AT} \
             WHERE id = $1 AND NOT soft_deleted \
             RETURNING {CONVERSATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ConversationRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        into_conversation(row)
    }

    async fn list_for_participant(&self, user_id: Uuid) -> RepositoryResult<Vec<Conversation>> {
        let query = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE (participant_a = $1 OR participant_b = $1) AND NOT soft_deleted \
             ORDER BY COALESCE(last_message_sent_at, created_at) DESC, id"
        );
        let rows = sqlx::query_as::<_, ConversationRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Conversation::try_from).collect()
    }
}
