//! Parley Auto-Reply Service
//!
//! Generates the automated replies a listing's owner side sends when a
//! counterpart writes to them:
//! - Anthropic Messages API integration for production
//! - Mock reply service for testing and development
//! - Provider selection from environment variables

pub mod anthropic;
pub mod mock;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use anthropic::AnthropicReplyService;
pub use mock::{MockReplyBehavior, MockReplyService};

const DEFAULT_MODEL: &str = "claude-haiku-4-5";
const DEFAULT_MAX_TOKENS: u32 = 300;

#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Auto-reply configuration error: {0}")]
    Configuration(String),

    #[error("Auto-reply request error: {0}")]
    Request(String),

    #[error("Auto-reply response error: {0}")]
    Response(String),

    #[error("Auto-reply provider rate limited")]
    RateLimit,
}

/// Which side of the conversation wrote a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyAuthor {
    /// The participant whose message triggered the reply
    Requester,
    /// The participant the reply is sent on behalf of
    Responder,
}

/// One message of the conversation, as seen by the reply generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub author: ReplyAuthor,
    pub content: String,
}

/// Everything a reply generator gets to see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub conversation_id: Uuid,
    pub message_id: Uuid,
    /// Listing kind the conversation is about ("space" or "vendor")
    pub topic_kind: String,
    pub topic_id: Uuid,
    /// Oldest first, ending with the triggering message
    pub transcript: Vec<TranscriptLine>,
}

/// Reply generation configuration
#[derive(Clone)]
pub struct ReplyConfig {
    /// Provider (anthropic, mock, disabled)
    pub provider: String,
    /// API key for the Anthropic provider
    pub api_key: String,
    /// Model used for replies
    pub model: String,
    /// Upper bound on reply length in tokens
    pub max_tokens: u32,
    /// Optional API base URL override
    pub base_url: Option<String>,
}

impl std::fmt::Debug for ReplyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ReplyConfig {
    /// Create reply config from environment variables.
    pub fn from_env() -> Result<Self, ReplyError> {
        let provider =
            std::env::var("AUTORESPONDER_PROVIDER").unwrap_or_else(|_| "disabled".to_string());

        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        if provider == "anthropic" && api_key.is_empty() {
            return Err(ReplyError::Configuration(
                "ANTHROPIC_API_KEY is required for the anthropic provider".to_string(),
            ));
        }

        let model =
            std::env::var("AUTORESPONDER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let max_tokens = std::env::var("AUTORESPONDER_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Ok(Self {
            provider,
            api_key,
            model,
            max_tokens,
            base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
        })
    }
}

/// Reply generation service trait for different implementations.
#[async_trait::async_trait]
pub trait ReplyService: Send + Sync {
    /// Produce a reply to the last transcript line, or `None` to stay silent.
    async fn generate_reply(&self, request: ReplyRequest) -> Result<Option<String>, ReplyError>;
}

/// Factory for creating ReplyService implementations.
pub struct ReplyServiceFactory;

impl ReplyServiceFactory {
    /// Create a ReplyService based on configuration.
    ///
    /// Returns `Ok(None)` when automated replies are disabled.
    pub fn create(config: ReplyConfig) -> Result<Option<Arc<dyn ReplyService>>, ReplyError> {
        match config.provider.as_str() {
            "anthropic" => {
                tracing::info!(model = %config.model, "Creating Anthropic reply service");
                if config.api_key.is_empty() {
                    return Err(ReplyError::Configuration(
                        "ANTHROPIC_API_KEY is required for the anthropic provider".to_string(),
                    ));
                }
                Ok(Some(Arc::new(AnthropicReplyService::new(config))))
            }
            "mock" => {
                tracing::info!("Creating mock reply service");
                Ok(Some(Arc::new(MockReplyService::new())))
            }
            "disabled" => {
                tracing::info!("Automated replies disabled");
                Ok(None)
            }
            provider => Err(ReplyError::Configuration(format!(
                "Unknown auto-reply provider: {}. Supported providers: anthropic, mock, disabled",
                provider
            ))),
        }
    }
}
