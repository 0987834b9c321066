//! Client-side reconciliation of the change feed
//!
//! Keeps one viewer's conversation list in recency order and the open
//! conversation's transcript in message order while change events arrive
//! in any order, possibly duplicated.

use std::collections::HashSet;

use uuid::Uuid;

use super::hub::ChangeEvent;
use super::recency::RecencyList;
use crate::domain::entities::{Conversation, Directory, Message};

/// Which conversation the viewer currently has open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    viewer_id: Uuid,
    open_conversation: Option<Uuid>,
}

impl ViewerContext {
    pub fn new(viewer_id: Uuid) -> Self {
        Self {
            viewer_id,
            open_conversation: None,
        }
    }

    pub fn viewer_id(&self) -> Uuid {
        self.viewer_id
    }

    pub fn open_conversation(&self) -> Option<Uuid> {
        self.open_conversation
    }

    pub fn is_open(&self, conversation_id: Uuid) -> bool {
        self.open_conversation == Some(conversation_id)
    }
}

/// What the UI should do after an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileSignal {
    /// A message was added to the open transcript
    ScrollToLatest,
}

/// Effect of a conversation event on the list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChange {
    Inserted,
    Promoted,
    Removed,
    /// Stale, duplicate, or for a conversation already removed
    Ignored,
}

/// Messages of the open conversation, ordered by `(created_at, sequence)`
#[derive(Debug, Clone, Default)]
struct Transcript {
    conversation_id: Option<Uuid>,
    messages: Vec<Message>,
    seen: HashSet<Uuid>,
}

impl Transcript {
    fn load(&mut self, conversation_id: Uuid, mut history: Vec<Message>) {
        history.sort_by_key(Message::order_key);
        history.dedup_by_key(|m| m.id);
        self.seen = history.iter().map(|m| m.id).collect();
        self.messages = history;
        self.conversation_id = Some(conversation_id);
    }

    fn clear(&mut self) {
        self.conversation_id = None;
        self.messages.clear();
        self.seen.clear();
    }

    /// Returns whether the message was new
    fn insert(&mut self, message: &Message) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }

        let key = message.order_key();
        match self.messages.last() {
            Some(last) if last.order_key() > key => {
                let at = self.messages.partition_point(|m| m.order_key() <= key);
                self.messages.insert(at, message.clone());
            }
            // In-order arrival
            _ => self.messages.push(message.clone()),
        }
        true
    }
}

/// Applies change events to one viewer's local view
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    conversations: RecencyList<Conversation>,
    /// Conversations dropped because they were soft-deleted; later events for
    /// them can only be stale
    removed: HashSet<Uuid>,
    transcript: Transcript,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with a freshly fetched snapshot, most recent first.
    ///
    /// Tombstones start over from the snapshot.
    pub fn seed<I>(&mut self, conversations: I)
    where
        I: IntoIterator<Item = Conversation>,
    {
        self.conversations.clear();
        self.removed.clear();
        for conversation in conversations {
            if conversation.soft_deleted {
                self.removed.insert(conversation.id);
                continue;
            }
            self.conversations.push_back(conversation.id, conversation);
        }
    }

    /// Open a conversation with its fetched history
    pub fn open(&mut self, ctx: &mut ViewerContext, conversation_id: Uuid, history: Vec<Message>) {
        if let Some(previous) = ctx.open_conversation.take() {
            self.drop_if_removed(previous);
        }
        ctx.open_conversation = Some(conversation_id);
        self.transcript.load(conversation_id, history);
    }

    /// Close the open conversation, if any
    pub fn close(&mut self, ctx: &mut ViewerContext) {
        if let Some(previous) = ctx.open_conversation.take() {
            self.drop_if_removed(previous);
        }
        self.transcript.clear();
    }

    pub fn apply(&mut self, ctx: &ViewerContext, event: &ChangeEvent) -> Option<ReconcileSignal> {
        match event {
            ChangeEvent::ConversationChanged { conversation } => {
                self.apply_conversation(ctx, conversation);
                None
            }
            ChangeEvent::MessageInserted { message } => self.apply_message(ctx, message),
        }
    }

    pub fn apply_conversation(
        &mut self,
        ctx: &ViewerContext,
        conversation: &Conversation,
    ) -> ListChange {
        if !conversation.is_participant(ctx.viewer_id) || self.removed.contains(&conversation.id)
        {
            return ListChange::Ignored;
        }

        let existing = self.conversations.get(conversation.id);
        if existing.is_some_and(|current| current.updated_at >= conversation.updated_at) {
            return ListChange::Ignored;
        }
        let known = existing.is_some();

        if conversation.soft_deleted && !ctx.is_open(conversation.id) {
            self.conversations.remove(conversation.id);
            self.removed.insert(conversation.id);
            return if known {
                ListChange::Removed
            } else {
                ListChange::Ignored
            };
        }

        // An open conversation that was removed stays in place until closed
        self.conversations
            .upsert_front(conversation.id, conversation.clone());
        if known {
            ListChange::Promoted
        } else {
            ListChange::Inserted
        }
    }

    pub fn apply_message(
        &mut self,
        ctx: &ViewerContext,
        message: &Message,
    ) -> Option<ReconcileSignal> {
        if !ctx.is_open(message.conversation_id)
            || self.transcript.conversation_id != Some(message.conversation_id)
        {
            return None;
        }

        self.transcript
            .insert(message)
            .then_some(ReconcileSignal::ScrollToLatest)
    }

    /// Local list, most recent first
    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.iter()
    }

    pub fn conversation(&self, id: Uuid) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Transcript of the open conversation
    pub fn transcript(&self) -> &[Message] {
        &self.transcript.messages
    }

    /// List split by topic kind, soft-deleted entries excluded
    pub fn directory(&self) -> Directory {
        Directory::partition(self.conversations.iter())
    }

    fn drop_if_removed(&mut self, conversation_id: Uuid) {
        if self
            .conversations
            .get(conversation_id)
            .is_some_and(|c| c.soft_deleted)
        {
            self.conversations.remove(conversation_id);
            self.removed.insert(conversation_id);
        }
    }
}
