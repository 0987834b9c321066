//! Word-list moderator
//!
//! Masks every whole-word, case-insensitive occurrence of a blocked word with
//! one `*` per character. Masking is idempotent because `*` never forms part
//! of a word.

use regex::Regex;

use crate::{ContentModerator, ModerationError};

/// Moderator that masks a fixed list of words
#[derive(Debug, Clone)]
pub struct WordListModerator {
    pattern: Option<Regex>,
}

impl WordListModerator {
    /// Build a moderator for the given words. An empty list masks nothing.
    pub fn new(words: &[String]) -> Result<Self, ModerationError> {
        let alternatives: Vec<String> = words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .map_err(|e| ModerationError::Configuration(format!("Invalid word list: {}", e)))?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }
}

impl ContentModerator for WordListModerator {
    fn moderate(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    "*".repeat(caps[0].chars().count())
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}
