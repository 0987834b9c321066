pub mod conversations;
pub mod events;
pub mod messages;
