//! Mock Reply Service Implementation
//!
//! Records every request for test assertions and answers according to a
//! configurable behavior. Thread-safe via `Arc<Mutex<>>`.

use crate::{ReplyError, ReplyRequest, ReplyService};
use std::sync::{Arc, Mutex};

/// How the mock answers
#[derive(Debug, Clone, PartialEq)]
pub enum MockReplyBehavior {
    /// Reply with `"Auto-reply: <last line>"`
    Echo,
    /// Reply with fixed text
    Fixed(String),
    /// Return `Ok(None)`
    Silent,
    /// Return a response error with this message
    Fail(String),
    /// Never complete
    Hang,
}

/// Mock reply service for testing
#[derive(Debug, Clone)]
pub struct MockReplyService {
    behavior: Arc<Mutex<MockReplyBehavior>>,
    requests: Arc<Mutex<Vec<ReplyRequest>>>,
}

impl MockReplyService {
    /// Create a mock that echoes the last transcript line
    pub fn new() -> Self {
        Self::with_behavior(MockReplyBehavior::Echo)
    }

    /// Create a mock with a specific behavior
    pub fn with_behavior(behavior: MockReplyBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change the behavior for subsequent calls
    pub fn set_behavior(&self, behavior: MockReplyBehavior) {
        *self
            .behavior
            .lock()
            .expect("behavior lock poisoned; a prior test panicked") = behavior;
    }

    /// Return all recorded requests.
    pub fn recorded_requests(&self) -> Vec<ReplyRequest> {
        self.requests
            .lock()
            .expect("requests lock poisoned; a prior test panicked")
            .clone()
    }
}

impl Default for MockReplyService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReplyService for MockReplyService {
    async fn generate_reply(&self, request: ReplyRequest) -> Result<Option<String>, ReplyError> {
        tracing::debug!(
            conversation_id = %request.conversation_id,
            message_id = %request.message_id,
            "Mock reply service: recording request"
        );

        let last_line = request
            .transcript
            .last()
            .map(|line| line.content.clone())
            .unwrap_or_default();

        self.requests
            .lock()
            .map_err(|e| ReplyError::Request(format!("requests lock poisoned: {e}")))?
            .push(request);

        let behavior = self
            .behavior
            .lock()
            .map_err(|e| ReplyError::Request(format!("behavior lock poisoned: {e}")))?
            .clone();

        match behavior {
            MockReplyBehavior::Echo => Ok(Some(format!("Auto-reply: {}", last_line))),
            MockReplyBehavior::Fixed(text) => Ok(Some(text)),
            MockReplyBehavior::Silent => Ok(None),
            MockReplyBehavior::Fail(message) => Err(ReplyError::Response(message)),
            MockReplyBehavior::Hang => std::future::pending().await,
        }
    }
}
