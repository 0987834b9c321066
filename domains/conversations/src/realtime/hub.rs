//! In-process change feed
//!
//! Every committed change is published to topic-keyed broadcast channels.
//! Directory subscribers listen on `viewer:{user_id}` and receive
//! [`ChangeEvent::ConversationChanged`] for every conversation they take part
//! in; transcript subscribers listen on `conversation:{id}` and receive
//! [`ChangeEvent::MessageInserted`].
//!
//! Delivery is at-least-once from the consumer's point of view: a lagging
//! receiver may miss events and must re-fetch, and duplicates are possible
//! across reconnects. Consumers reconcile by id and `updated_at`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::domain::entities::{Conversation, Message};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A committed change, as seen by subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Full post-change row of a conversation
    ConversationChanged { conversation: Conversation },
    /// A message that was appended
    MessageInserted { message: Message },
}

impl ChangeEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::ConversationChanged { .. } => "conversation_changed",
            ChangeEvent::MessageInserted { .. } => "message_inserted",
        }
    }
}

/// Channel a subscriber listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// Every conversation the user participates in
    Viewer(Uuid),
    /// New messages of one conversation
    Conversation(Uuid),
}

impl std::fmt::Display for EventScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventScope::Viewer(id) => write!(f, "viewer:{}", id),
            EventScope::Conversation(id) => write!(f, "conversation:{}", id),
        }
    }
}

/// Topic-keyed broadcast hub. Cheap to clone.
#[derive(Clone)]
pub struct EventHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>>,
    capacity: usize,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Publish to one scope. No-op if nobody listens.
    pub async fn publish(&self, scope: EventScope, event: ChangeEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&scope.to_string()) {
            // No receivers left is not an error
            let _ = tx.send(event);
        }
    }

    /// Publish a conversation row to both participants' directory feeds
    pub async fn publish_conversation(&self, conversation: &Conversation) {
        for participant in [conversation.participant_a, conversation.participant_b] {
            self.publish(
                EventScope::Viewer(participant),
                ChangeEvent::ConversationChanged {
                    conversation: conversation.clone(),
                },
            )
            .await;
        }
    }

    /// Publish an appended message to its conversation's feed
    pub async fn publish_message(&self, message: &Message) {
        self.publish(
            EventScope::Conversation(message.conversation_id),
            ChangeEvent::MessageInserted {
                message: message.clone(),
            },
        )
        .await;
    }

    /// Subscribe to a scope, creating its channel on first use
    pub async fn subscribe(&self, scope: EventScope) -> broadcast::Receiver<ChangeEvent> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(scope.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Drop channels nobody listens to anymore
    pub async fn cleanup(&self) {
        Self::retain_listened(&self.channels).await;
    }

    /// Run [`cleanup`](Self::cleanup) every `every` on the current runtime.
    ///
    /// The task ends on its own once every clone of the hub is dropped.
    pub fn spawn_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let channels: Weak<_> = Arc::downgrade(&self.channels);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(live) = channels.upgrade() else {
                    break;
                };
                Self::retain_listened(&live).await;
            }
        })
    }

    async fn retain_listened(channels: &RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>) {
        let mut channels = channels.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);

        let reclaimed = before - channels.len();
        if reclaimed > 0 {
            tracing::debug!(reclaimed, remaining = channels.len(), "Reclaimed idle change feeds");
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
