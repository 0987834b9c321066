//! Conversations domain: two-party threads about a listing, their messages,
//! the change feed, and automated replies

pub mod api;
pub mod domain;
pub mod realtime;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{
    Conversation, Directory, LastMessage, Message, MessageDraft, MessageOrigin, PairKey, Topic,
    TopicContext, TopicKind, MAX_MESSAGE_LENGTH,
};
pub use domain::error::{ConversationError, ConversationResult};
pub use domain::state::{
    ConversationEvent, ConversationState, ConversationStateMachine, StateError,
};

// Re-export repository types
pub use repository::{
    AppendOutcome, ConversationStore, ConversationsRepositories, InMemoryStore, MessageStore,
};

// Re-export services and the change feed
pub use realtime::{ChangeEvent, EventHub, EventScope, ReconcileSignal, Reconciler, ViewerSession};
pub use service::{AutoResponder, AutoResponderTrigger, AutoResponderWorker, MessagingService};

// Re-export API types
pub use api::routes;
pub use api::ConversationsState;
