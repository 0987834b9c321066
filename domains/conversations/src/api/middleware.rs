//! Conversations domain state

use std::sync::Arc;

use parley_moderation::ContentModerator;

use crate::service::MessagingService;

/// Application state for the Conversations domain
#[derive(Clone)]
pub struct ConversationsState {
    pub service: Arc<MessagingService>,
}

impl ConversationsState {
    pub fn new(service: MessagingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    /// Moderator applied to text again at display time
    pub fn moderator(&self) -> &dyn ContentModerator {
        self.service.moderator().as_ref()
    }
}
