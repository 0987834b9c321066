//! Parley Content Moderation
//!
//! Provides the `moderate(text) -> text` collaborator used when messages are
//! stored and again when they are displayed:
//! - Word-list masking provider for production
//! - Passthrough provider for development and tests
//! - Provider selection from environment variables

pub mod wordlist;

use std::sync::Arc;
use thiserror::Error;

pub use wordlist::WordListModerator;

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("Moderation configuration error: {0}")]
    Configuration(String),
}

/// Rewrites message text before it is stored or shown.
///
/// Implementations must be pure: the same input always yields the same
/// output, and applying the moderator to its own output changes nothing.
pub trait ContentModerator: Send + Sync {
    fn moderate(&self, text: &str) -> String;
}

/// Moderator that returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughModerator;

impl ContentModerator for PassthroughModerator {
    fn moderate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Moderation configuration
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// Moderation provider (wordlist, passthrough)
    pub provider: String,
    /// Words masked by the wordlist provider
    pub blocked_words: Vec<String>,
}

impl ModerationConfig {
    /// Create moderation config from environment variables.
    pub fn from_env() -> Self {
        let provider =
            std::env::var("MODERATION_PROVIDER").unwrap_or_else(|_| "wordlist".to_string());

        let blocked_words = std::env::var("MODERATION_BLOCKED_WORDS")
            .map(|raw| parse_word_list(&raw))
            .unwrap_or_default();

        Self {
            provider,
            blocked_words,
        }
    }
}

/// Split a comma-separated word list, dropping blanks
pub fn parse_word_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Factory for creating ContentModerator implementations.
pub struct ModeratorFactory;

impl ModeratorFactory {
    /// Create a ContentModerator based on configuration.
    pub fn create(config: ModerationConfig) -> Result<Arc<dyn ContentModerator>, ModerationError> {
        match config.provider.as_str() {
            "wordlist" => {
                tracing::info!(
                    words = config.blocked_words.len(),
                    "Creating word-list moderator"
                );
                Ok(Arc::new(WordListModerator::new(&config.blocked_words)?))
            }
            "passthrough" => {
                tracing::info!("Creating passthrough moderator");
                Ok(Arc::new(PassthroughModerator))
            }
            provider => Err(ModerationError::Configuration(format!(
                "Unknown moderation provider: {}. Supported providers: wordlist, passthrough",
                provider
            ))),
        }
    }
}
