//! Session summarizer
//!
//! Produces natural-language summaries of a session transcript and of a
//! user's accumulated session summaries. Generation failures never escape:
//! a failed call yields [`SUMMARY_FALLBACK`].

use std::sync::Arc;

use solace_core::generation::{with_timeout, GenerationError, TextGenerator};
use solace_core::models::{transcript, Message};

pub const SUMMARY_FALLBACK: &str =
    "A summary could not be generated for this session right now.";

#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    timeout_seconds: u64,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout_seconds: u64) -> Self {
        Self {
            generator,
            timeout_seconds,
        }
    }

    /// Summarize raw session text.
    pub async fn summarize(&self, text: &str) -> String {
        self.generate_or_fallback(&session_prompt(text)).await
    }

    pub async fn summarize_messages(&self, messages: &[Message]) -> String {
        self.summarize(&transcript(messages)).await
    }

    /// Combine prior summaries into one narrative. Empty input skips the
    /// call and returns an empty string.
    pub async fn summarize_history(&self, summaries: &[String]) -> String {
        let combined = summaries
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if combined.is_empty() {
            return String::new();
        }
        self.generate_or_fallback(&history_prompt(&combined)).await
    }

    async fn generate_or_fallback(&self, prompt: &str) -> String {
        match self.try_generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    generator = self.generator.name(),
                    "Summary generation failed, using fallback"
                );
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<String, GenerationError> {
        with_timeout(self.timeout_seconds, self.generator.generate(prompt)).await
    }
}

pub fn session_prompt(text: &str) -> String {
    format!(
        "Summarize the following therapy session in a few sentences. Focus on what the person \
         talked about, how they felt, and anything they want to change.\n\n{}\n\nSummary:",
        text
    )
}

pub fn history_prompt(summaries: &str) -> String {
    format!(
        "The following are summaries of a person's past therapy sessions, oldest first. \
         Write a short overall summary of recurring themes and how they are progressing.\n\n{}\n\nOverall summary:",
        summaries
    )
}
