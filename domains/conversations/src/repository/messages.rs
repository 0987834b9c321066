//! Postgres message store
//!
//! Appends run in one transaction that locks the conversation row, so the
//! message insert and the snapshot update land together or not at all, and
//! concurrent appends to one conversation get consecutive sequences.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::conversations::{ConversationRow, CONVERSATION_COLUMNS, NEXT_UPDATED_AT};
use super::{AppendOutcome, MessageStore, RepositoryResult};
use crate::domain::entities::{Conversation, Message, MessageDraft};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, origin, sequence, created_at";

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Lock the conversation row; `None` when it does not exist
async fn lock_conversation_tx(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: Uuid,
) -> Result<Option<bool>, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT soft_deleted FROM conversations WHERE id = $1 FOR UPDATE")
        .bind(conversation_id)
        .fetch_optional(&mut **tx)
        .await
}

/// Next sequence and a creation time never earlier than the newest message
async fn next_position_tx(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: Uuid,
) -> Result<(i64, DateTime<Utc>), sqlx::Error> {
    sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        "SELECT COALESCE(MAX(sequence), 0) + 1, \
                GREATEST(clock_timestamp(), COALESCE(MAX(created_at), clock_timestamp())) \
         FROM messages WHERE conversation_id = $1",
    )
    .bind(conversation_id)
    .fetch_one(&mut **tx)
    .await
}

async fn insert_message_tx(
    tx: &mut Transaction<'_, Postgres>,
    message: &Message,
) -> Result<Message, sqlx::Error> {
    let query = format!(
        "INSERT INTO messages ({MESSAGE_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {MESSAGE_COLUMNS}"
    );
    sqlx::query_as::<_, Message>(&query)
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.origin)
        .bind(message.sequence)
        .bind(message.created_at)
        .fetch_one(&mut **tx)
        .await
}

async fn point_snapshot_at_tx(
    tx: &mut Transaction<'_, Postgres>,
    message: &Message,
) -> Result<ConversationRow, sqlx::Error> {
    let query = format!(
        "UPDATE conversations SET \
            last_message_content = $2, last_message_sent_at = $3, last_message_sender_id = $4, \
            unread = TRUE, updated_at = {NEXT_UPDATED_AT} \
         WHERE id = $1 AND NOT soft_deleted \
         RETURNING {CONVERSATION_COLUMNS}"
    );
    sqlx::query_as::<_, ConversationRow>(&query)
        .bind(message.conversation_id)
        .bind(&message.content)
        .bind(message.created_at)
        .bind(message.sender_id)
        .fetch_one(&mut **tx)
        .await
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> RepositoryResult<AppendOutcome> {
        let mut tx = self.pool.begin().await?;

        match lock_conversation_tx(&mut tx, conversation_id).await? {
            None => return Ok(AppendOutcome::ConversationMissing),
            Some(true) => return Ok(AppendOutcome::ConversationDeleted),
            Some(false) => {}
        }

        let (sequence, created_at) = next_position_tx(&mut tx, conversation_id).await?;
        let message = draft.into_message(conversation_id, sequence, created_at);

        let message = insert_message_tx(&mut tx, &message).await?;
        let row = point_snapshot_at_tx(&mut tx, &message).await?;

        tx.commit().await?;

        Ok(AppendOutcome::Appended {
            message,
            conversation: Conversation::try_from(row)?,
        })
    }

    async fn list_by_conversation(&self, conversation_id: Uuid) -> RepositoryResult<Vec<Message>> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY created_at ASC, sequence ASC"
        );
        let messages = sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(messages)
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Message>> {
        let query = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }
}
