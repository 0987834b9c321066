//! Conversation operations: resolution, messaging, automated replies

pub mod auto_responder;
pub mod delivery;
pub mod messaging;
pub mod resolver;

pub use auto_responder::{AutoReplyJob, AutoResponder, AutoResponderTrigger, AutoResponderWorker};
pub use delivery::MessageDelivery;
pub use messaging::MessagingService;
pub use resolver::{ConversationResolver, Resolution};
