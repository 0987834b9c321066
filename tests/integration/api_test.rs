//! API endpoint integration tests
//!
//! Drives the composed router end to end over the in-memory store.

#![allow(dead_code)]

mod common;
mod conversations;
mod events;
mod messages;
