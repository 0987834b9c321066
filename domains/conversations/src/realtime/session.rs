//! One viewer's live session: reconciled list, open transcript, and the
//! counterpart display names needed to render them

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use super::hub::ChangeEvent;
use super::reconciler::{ReconcileSignal, Reconciler, ViewerContext};
use crate::domain::entities::{Conversation, Directory, Message};

/// Resolves user ids to human-readable names
#[async_trait]
pub trait DisplayNames: Send + Sync {
    /// `None` when the user is unknown
    async fn display_name(&self, user_id: Uuid) -> Option<String>;
}

pub struct ViewerSession {
    ctx: ViewerContext,
    reconciler: Reconciler,
    names: Arc<dyn DisplayNames>,
    /// Every looked-up user; `None` when the lookup found nobody
    resolved: HashMap<Uuid, Option<String>>,
}

impl ViewerSession {
    pub fn new(viewer_id: Uuid, names: Arc<dyn DisplayNames>) -> Self {
        Self {
            ctx: ViewerContext::new(viewer_id),
            reconciler: Reconciler::new(),
            names,
            resolved: HashMap::new(),
        }
    }

    pub fn viewer_id(&self) -> Uuid {
        self.ctx.viewer_id()
    }

    pub fn context(&self) -> &ViewerContext {
        &self.ctx
    }

    /// Seed from a directory snapshot, most recent first, and resolve every
    /// counterpart name concurrently
    pub async fn load(&mut self, conversations: Vec<Conversation>) {
        let viewer = self.ctx.viewer_id();
        let counterparts: HashSet<Uuid> = conversations
            .iter()
            .filter_map(|c| c.counterpart_of(viewer))
            .collect();

        self.reconciler.seed(conversations);
        self.resolve(counterparts).await;
    }

    /// Apply one change event; new counterparts are resolved before returning
    pub async fn handle(&mut self, event: &ChangeEvent) -> Option<ReconcileSignal> {
        let signal = self.reconciler.apply(&self.ctx, event);

        if let ChangeEvent::ConversationChanged { conversation } = event {
            if let Some(counterpart) = conversation.counterpart_of(self.ctx.viewer_id()) {
                self.resolve([counterpart]).await;
            }
        }

        signal
    }

    pub fn open(&mut self, conversation_id: Uuid, history: Vec<Message>) {
        self.reconciler.open(&mut self.ctx, conversation_id, history);
    }

    pub fn close(&mut self) {
        self.reconciler.close(&mut self.ctx);
    }

    pub fn directory(&self) -> Directory {
        self.reconciler.directory()
    }

    pub fn transcript(&self) -> &[Message] {
        self.reconciler.transcript()
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.reconciler.conversations()
    }

    /// Name of the other participant of a listed conversation
    pub fn counterpart_name(&self, conversation_id: Uuid) -> Option<&str> {
        let counterpart = self
            .reconciler
            .conversation(conversation_id)?
            .counterpart_of(self.ctx.viewer_id())?;
        self.resolved.get(&counterpart)?.as_deref()
    }

    /// Whether every listed counterpart has been looked up
    pub fn names_settled(&self) -> bool {
        let viewer = self.ctx.viewer_id();
        self.reconciler
            .conversations()
            .filter_map(|c| c.counterpart_of(viewer))
            .all(|user| self.resolved.contains_key(&user))
    }

    async fn resolve<I>(&mut self, users: I)
    where
        I: IntoIterator<Item = Uuid>,
    {
        let missing: Vec<Uuid> = users
            .into_iter()
            .filter(|user| !self.resolved.contains_key(user))
            .collect();
        if missing.is_empty() {
            return;
        }

        let names = self.names.clone();
        let lookups = missing.iter().map(|user| {
            let names = names.clone();
            let user = *user;
            async move { (user, names.display_name(user).await) }
        });

        for (user, name) in join_all(lookups).await {
            if name.is_none() {
                tracing::debug!(user_id = %user, "No display name found");
            }
            self.resolved.insert(user, name);
        }
    }
}
