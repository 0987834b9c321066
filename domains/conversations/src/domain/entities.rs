//! Domain entities for the Conversations domain
//!
//! A conversation is the thread between two marketplace users about one
//! listing (a space or a vendor). Messages belong to exactly one conversation
//! and are never edited or removed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ConversationError, ConversationResult};
use super::state::{ConversationEvent, ConversationState, ConversationStateMachine, StateError};

/// Maximum message length in characters
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Listing kind a conversation is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "topic_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Space,
    Vendor,
}

impl std::fmt::Display for TopicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicKind::Space => write!(f, "space"),
            TopicKind::Vendor => write!(f, "vendor"),
        }
    }
}

/// The listing a conversation is about. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Topic {
    Space(Uuid),
    Vendor(Uuid),
}

impl Topic {
    pub fn from_parts(kind: TopicKind, id: Uuid) -> Self {
        match kind {
            TopicKind::Space => Topic::Space(id),
            TopicKind::Vendor => Topic::Vendor(id),
        }
    }

    pub fn kind(&self) -> TopicKind {
        match self {
            Topic::Space(_) => TopicKind::Space,
            Topic::Vendor(_) => TopicKind::Vendor,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Topic::Space(id) | Topic::Vendor(id) => *id,
        }
    }
}

/// Order-independent identity of two participants.
///
/// `PairKey::new(a, b) == PairKey::new(b, a)`; the store's uniqueness
/// constraint is expressed over `(low, high, topic)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    low: Uuid,
    high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> ConversationResult<Self> {
        if a == b {
            return Err(ConversationError::Validation(
                "A conversation needs two different participants".to_string(),
            ));
        }
        Ok(if a < b {
            PairKey { low: a, high: b }
        } else {
            PairKey { low: b, high: a }
        })
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }
}

/// Denormalized summary of the newest message, kept for directory rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub sender_id: Uuid,
}

/// Conversation entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    /// Initiator; provenance only, the pair is unordered
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub topic: Topic,
    pub created_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
    pub unread: bool,
    pub soft_deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation with an empty snapshot
    pub fn new(initiator: Uuid, counterpart: Uuid, topic: Topic) -> ConversationResult<Self> {
        PairKey::new(initiator, counterpart)?;

        let now = Utc::now();
        Ok(Conversation {
            id: Uuid::new_v4(),
            participant_a: initiator,
            participant_b: counterpart,
            topic,
            created_at: now,
            last_message: None,
            unread: false,
            soft_deleted: false,
            updated_at: now,
        })
    }

    pub fn pair_key(&self) -> PairKey {
        // Both participants were checked distinct on construction
        if self.participant_a < self.participant_b {
            PairKey {
                low: self.participant_a,
                high: self.participant_b,
            }
        } else {
            PairKey {
                low: self.participant_b,
                high: self.participant_a,
            }
        }
    }

    pub fn state(&self) -> ConversationState {
        if self.soft_deleted {
            ConversationState::SoftDeleted
        } else {
            ConversationState::Active
        }
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }

    /// The other participant, if `user_id` is one of the two
    pub fn counterpart_of(&self, user_id: Uuid) -> Option<Uuid> {
        if self.participant_a == user_id {
            Some(self.participant_b)
        } else if self.participant_b == user_id {
            Some(self.participant_a)
        } else {
            None
        }
    }

    pub fn ensure_participant(&self, user_id: Uuid) -> ConversationResult<()> {
        if self.is_participant(user_id) {
            Ok(())
        } else {
            Err(ConversationError::NotParticipant)
        }
    }

    pub fn ensure_active(&self) -> ConversationResult<()> {
        if self.soft_deleted {
            Err(ConversationError::Gone)
        } else {
            Ok(())
        }
    }

    /// Whether `viewer` has a message they have not seen yet
    pub fn is_unread_for(&self, viewer: Uuid) -> bool {
        self.unread
            && self
                .last_message
                .as_ref()
                .is_some_and(|m| m.sender_id != viewer)
    }

    /// Timestamp used for recency ordering
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(|m| m.sent_at)
            .unwrap_or(self.created_at)
    }

    /// Point the snapshot at a freshly appended message and flag it unread
    pub fn record_message(&mut self, message: &Message) -> Result<(), StateError> {
        ConversationStateMachine::transition(self.state(), ConversationEvent::AppendMessage)?;

        self.last_message = Some(LastMessage {
            content: message.content.clone(),
            sent_at: message.created_at,
            sender_id: message.sender_id,
        });
        self.unread = true;
        self.touch();
        Ok(())
    }

    /// Clear the unread flag on behalf of `viewer`.
    ///
    /// Returns whether anything changed. The sender of the newest message
    /// cannot clear it.
    pub fn acknowledge(&mut self, viewer: Uuid) -> Result<bool, StateError> {
        ConversationStateMachine::transition(self.state(), ConversationEvent::MarkRead)?;

        if !self.is_unread_for(viewer) {
            return Ok(false);
        }
        self.unread = false;
        self.touch();
        Ok(true)
    }

    /// Move to the terminal soft-deleted state
    pub fn soft_delete(&mut self) -> Result<(), StateError> {
        ConversationStateMachine::transition(self.state(), ConversationEvent::SoftDelete)?;
        self.soft_deleted = true;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = strictly_after(self.updated_at);
    }
}

/// `now`, or one microsecond past `previous` if the clock has not moved past it
pub fn strictly_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_origin", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Human,
    AutomatedReply,
}

impl std::fmt::Display for MessageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageOrigin::Human => write!(f, "human"),
            MessageOrigin::AutomatedReply => write!(f, "automated_reply"),
        }
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    /// Post-moderation text
    pub content: String,
    pub origin: MessageOrigin,
    /// 1-based position within the conversation
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Total order within a conversation
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.sequence)
    }

    /// Validate raw message content before moderation
    pub fn validate_content(content: &str) -> ConversationResult<()> {
        if content.trim().is_empty() {
            return Err(ConversationError::Validation(
                "Message content cannot be empty or whitespace-only".to_string(),
            ));
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ConversationError::Validation(format!(
                "Message content must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }
        Ok(())
    }
}

/// A message before the store has assigned its position and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub origin: MessageOrigin,
}

impl MessageDraft {
    pub fn human(sender_id: Uuid, content: String) -> Self {
        Self::new(sender_id, content, MessageOrigin::Human)
    }

    pub fn automated(sender_id: Uuid, content: String) -> Self {
        Self::new(sender_id, content, MessageOrigin::AutomatedReply)
    }

    fn new(sender_id: Uuid, content: String, origin: MessageOrigin) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            content,
            origin,
        }
    }

    /// Materialize the draft at a given position
    pub fn into_message(
        self,
        conversation_id: Uuid,
        sequence: i64,
        created_at: DateTime<Utc>,
    ) -> Message {
        Message {
            id: self.id,
            conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            origin: self.origin,
            sequence,
            created_at,
        }
    }
}

/// What a caller knows when arriving "from a listing"; enough to revive a
/// removed conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicContext {
    pub participant_self: Uuid,
    pub participant_other: Uuid,
    pub topic: Topic,
}

/// Conversations split by listing kind, each in recency order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Directory {
    pub spaces: Vec<Conversation>,
    pub vendors: Vec<Conversation>,
}

impl Directory {
    /// Partition already-ordered conversations, dropping soft-deleted ones
    pub fn partition<'a, I>(conversations: I) -> Self
    where
        I: IntoIterator<Item = &'a Conversation>,
    {
        let mut directory = Directory::default();
        for conversation in conversations {
            if conversation.soft_deleted {
                continue;
            }
            match conversation.topic.kind() {
                TopicKind::Space => directory.spaces.push(conversation.clone()),
                TopicKind::Vendor => directory.vendors.push(conversation.clone()),
            }
        }
        directory
    }

    pub fn len(&self) -> usize {
        self.spaces.len() + self.vendors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, conversation_id: Uuid) -> bool {
        self.spaces
            .iter()
            .chain(self.vendors.iter())
            .any(|c| c.id == conversation_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
