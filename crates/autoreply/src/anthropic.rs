//! Anthropic Claude reply generation
//!
//! Calls the Anthropic Messages API (https://api.anthropic.com/v1/messages)
//! using reqwest HTTP client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{ReplyAuthor, ReplyConfig, ReplyError, ReplyRequest, ReplyService, TranscriptLine};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You answer marketplace inquiries on behalf of a listing's owner \
while they are away. Reply briefly and politely, acknowledge the question, and say the owner \
will follow up personally. Never agree to prices, dates or payments. Reply with the message \
text only.";

/// Anthropic Messages API request body
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<MessageBody>,
}

#[derive(Debug, Serialize, PartialEq)]
struct MessageBody {
    role: &'static str,
    content: String,
}

/// Anthropic Messages API response body
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic-backed reply service
pub struct AnthropicReplyService {
    client: Client,
    config: ReplyConfig,
    base_url: String,
}

impl AnthropicReplyService {
    /// Create a new Anthropic reply service
    pub fn new(config: ReplyConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client: Client::new(),
            config,
            base_url,
        }
    }
}

/// Map a transcript onto alternating API turns.
///
/// Consecutive lines from the same side are merged into one turn. Returns
/// `None` when there is nothing to answer (empty transcript or the last line
/// is already from the responder side).
fn build_turns(transcript: &[TranscriptLine]) -> Option<Vec<MessageBody>> {
    if transcript.last()?.author != ReplyAuthor::Requester {
        return None;
    }

    let mut turns: Vec<MessageBody> = Vec::new();
    for line in transcript {
        let role = match line.author {
            ReplyAuthor::Requester => "user",
            ReplyAuthor::Responder => "assistant",
        };
        match turns.last_mut() {
            Some(turn) if turn.role == role => {
                turn.content.push_str("\n\n");
                turn.content.push_str(&line.content);
            }
            _ => turns.push(MessageBody {
                role,
                content: line.content.clone(),
            }),
        }
    }

    // The API requires the first turn to come from the user
    if turns.first().map(|t| t.role) == Some("assistant") {
        turns.remove(0);
    }

    Some(turns)
}

#[async_trait::async_trait]
impl ReplyService for AnthropicReplyService {
    async fn generate_reply(&self, request: ReplyRequest) -> Result<Option<String>, ReplyError> {
        let Some(messages) = build_turns(&request.transcript) else {
            tracing::debug!(
                conversation_id = %request.conversation_id,
                "Transcript has nothing to answer, skipping Anthropic call"
            );
            return Ok(None);
        };

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: format!(
                "{} The conversation is about a {} listing.",
                SYSTEM_PROMPT, request.topic_kind
            ),
            messages,
        };

        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(
            conversation_id = %request.conversation_id,
            message_id = %request.message_id,
            model = %self.config.model,
            "Sending Anthropic reply request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReplyError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ReplyError::RateLimit);
        }

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_body) {
                return Err(ReplyError::Response(format!(
                    "Anthropic API error ({}): {}",
                    error_response.error.error_type, error_response.error.message
                )));
            }

            return Err(ReplyError::Response(format!(
                "Anthropic API returned {}: {}",
                status, error_body
            )));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::Response(format!("Failed to parse response: {}", e)))?;

        let text = api_response
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(text.to_string()))
    }
}
