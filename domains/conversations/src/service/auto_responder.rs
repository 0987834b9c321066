//! Automated replies, decoupled from the send path
//!
//! `send_message` enqueues a job and returns; a background worker picks jobs
//! off a bounded queue and runs each in its own task with a time limit.
//! Failures are logged and never reach the sender. Replies are inserted with
//! [`MessageOrigin::AutomatedReply`] and never trigger further replies.

use std::sync::Arc;
use std::time::Duration;

use parley_autoreply::{ReplyAuthor, ReplyError, ReplyRequest, ReplyService, TranscriptLine};
use parley_moderation::ContentModerator;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::domain::entities::{Message, MessageDraft, MessageOrigin};
use crate::domain::error::ConversationError;
use crate::repository::{ConversationStore, ConversationsRepositories, MessageStore};
use crate::service::delivery::MessageDelivery;

/// A message that may deserve an automated reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoReplyJob {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
enum AutoReplyFailure {
    #[error("reply generation failed: {0}")]
    Reply(#[from] ReplyError),

    #[error("automated reply timed out after {0:?}")]
    TimedOut(Duration),

    #[error("triggering message {0} not found")]
    TriggerMissing(Uuid),

    #[error("sender of message {0} is not a participant")]
    NoCounterpart(Uuid),

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

impl From<parley_common::RepositoryError> for AutoReplyFailure {
    fn from(err: parley_common::RepositoryError) -> Self {
        AutoReplyFailure::Conversation(err.into())
    }
}

/// Why a job ended without a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    ConversationGone,
    AutomatedTrigger,
    NothingToSay,
}

/// Handle used by the send path. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct AutoResponderTrigger {
    tx: mpsc::Sender<AutoReplyJob>,
}

impl AutoResponderTrigger {
    /// Enqueue a job. Returns whether it was accepted; a full queue drops it.
    pub fn trigger(&self, conversation_id: Uuid, message_id: Uuid) -> bool {
        let job = AutoReplyJob {
            conversation_id,
            message_id,
        };
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(
                    conversation_id = %job.conversation_id,
                    message_id = %job.message_id,
                    "Auto-reply queue full, dropping job"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(
                    conversation_id = %job.conversation_id,
                    message_id = %job.message_id,
                    "Auto-reply worker stopped, dropping job"
                );
                false
            }
        }
    }
}

/// Running worker. Dropping every trigger lets it drain and stop.
pub struct AutoResponderWorker {
    handle: JoinHandle<()>,
    finished: watch::Receiver<u64>,
}

impl AutoResponderWorker {
    /// Count of jobs that have run to completion, successfully or not
    pub fn finished_jobs(&self) -> watch::Receiver<u64> {
        self.finished.clone()
    }

    /// Wait for the worker to drain after all triggers were dropped
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Auto-reply worker panicked");
            }
        }
    }

    /// Stop immediately, cancelling in-flight jobs
    #[mutants::skip] // Delegates to JoinHandle::abort
    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[derive(Clone)]
pub struct AutoResponder {
    reply: Arc<dyn ReplyService>,
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    moderator: Arc<dyn ContentModerator>,
    delivery: MessageDelivery,
    timeout: Duration,
}

impl AutoResponder {
    pub fn new(
        reply: Arc<dyn ReplyService>,
        repos: &ConversationsRepositories,
        moderator: Arc<dyn ContentModerator>,
        delivery: MessageDelivery,
        timeout: Duration,
    ) -> Self {
        Self {
            reply,
            conversations: repos.conversations.clone(),
            messages: repos.messages.clone(),
            moderator,
            delivery,
            timeout,
        }
    }

    /// Spawn the worker on the current runtime
    pub fn start(self, queue_capacity: usize) -> (AutoResponderTrigger, AutoResponderWorker) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (done_tx, done_rx) = watch::channel(0u64);

        let handle = tokio::spawn(self.run(rx, done_tx));

        (
            AutoResponderTrigger { tx },
            AutoResponderWorker {
                handle,
                finished: done_rx,
            },
        )
    }

    async fn run(self, mut rx: mpsc::Receiver<AutoReplyJob>, done: watch::Sender<u64>) {
        tracing::info!(timeout_ms = self.timeout.as_millis() as u64, "Auto-reply worker started");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => {
                        let responder = self.clone();
                        tasks.spawn(async move { responder.run_job(job).await });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::record_finished(joined, &done);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::record_finished(joined, &done);
        }
        tracing::info!("Auto-reply worker stopped");
    }

    fn record_finished(joined: Result<(), tokio::task::JoinError>, done: &watch::Sender<u64>) {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Auto-reply job aborted");
        }
        done.send_modify(|n| *n += 1);
    }

    async fn run_job(&self, job: AutoReplyJob) {
        let outcome = tokio::time::timeout(self.timeout, self.respond(job))
            .await
            .unwrap_or(Err(AutoReplyFailure::TimedOut(self.timeout)));

        match outcome {
            Ok(Ok(message)) => tracing::info!(
                conversation_id = %job.conversation_id,
                trigger_id = %job.message_id,
                reply_id = %message.id,
                "Automated reply sent"
            ),
            Ok(Err(skip)) => tracing::debug!(
                conversation_id = %job.conversation_id,
                trigger_id = %job.message_id,
                reason = ?skip,
                "No automated reply"
            ),
            Err(e) => tracing::warn!(
                conversation_id = %job.conversation_id,
                trigger_id = %job.message_id,
                error = %e,
                "Automated reply failed"
            ),
        }
    }

    async fn respond(&self, job: AutoReplyJob) -> Result<Result<Message, Skip>, AutoReplyFailure> {
        let conversation = match self.conversations.find(job.conversation_id).await? {
            Some(c) if !c.soft_deleted => c,
            _ => return Ok(Err(Skip::ConversationGone)),
        };

        let trigger = self
            .messages
            .find(job.message_id)
            .await?
            .filter(|m| m.conversation_id == job.conversation_id)
            .ok_or(AutoReplyFailure::TriggerMissing(job.message_id))?;

        if trigger.origin == MessageOrigin::AutomatedReply {
            return Ok(Err(Skip::AutomatedTrigger));
        }

        let history = self.messages.list_by_conversation(job.conversation_id).await?;

        let responder = conversation
            .counterpart_of(trigger.sender_id)
            .ok_or(AutoReplyFailure::NoCounterpart(trigger.id))?;

        let trigger_key = trigger.order_key();
        let transcript = history
            .iter()
            .filter(|m| m.order_key() <= trigger_key)
            .map(|m| TranscriptLine {
                author: if m.sender_id == trigger.sender_id {
                    ReplyAuthor::Requester
                } else {
                    ReplyAuthor::Responder
                },
                content: m.content.clone(),
            })
            .collect();

        let request = ReplyRequest {
            conversation_id: conversation.id,
            message_id: trigger.id,
            topic_kind: conversation.topic.kind().to_string(),
            topic_id: conversation.topic.id(),
            transcript,
        };

        let generated = self.reply.generate_reply(request).await?;

        let Some(text) = generated else {
            return Ok(Err(Skip::NothingToSay));
        };

        Message::validate_content(&text)?;
        let content = self.moderator.moderate(&text);

        match self
            .delivery
            .deliver(conversation.id, MessageDraft::automated(responder, content))
            .await
        {
            Ok((message, _)) => Ok(Ok(message)),
            Err(ConversationError::SendRejected) => Ok(Err(Skip::ConversationGone)),
            Err(e) => Err(e.into()),
        }
    }
}
