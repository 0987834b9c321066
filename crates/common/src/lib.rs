//! Shared configuration, error handling and extractors for Parley
//!
//! This crate provides common functionality used across the Parley service:
//! - Configuration management following 12-factor principles
//! - Error types and their HTTP representation
//! - Repository and state machine error types
//! - Axum extractors for caller identity and validated request bodies

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod state;

pub use config::{Config, StoreBackend};
pub use db::RepositoryError;
pub use error::{error_response, Error, Result};
pub use extractors::{ValidatedJson, ViewerId, VIEWER_HEADER};
pub use state::StateError;
