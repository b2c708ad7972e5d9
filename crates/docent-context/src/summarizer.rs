//! Compression of older conversation turns through the LLM

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use docent_protocol::ChatMessage;
use docent_runtime::{CompletionProvider, CompletionRequest};

use crate::error::SummarizeError;
use crate::tokens::{TokenCounter, DOCUMENT_SEPARATOR};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Instruction under which old turns are compressed. Prose output matters:
/// bullet lists fragment badly when a summary is itself re-summarized on a
/// later round.
const SUMMARY_SYSTEM_PROMPT: &str = "You compress the older part of a support conversation into an archival summary. \
Keep every question and its answer, condensed but complete. \
Reproduce technical literals exactly as written: commands, version numbers, error codes, file paths, identifiers. \
Where documentation excerpts are attached, keep only the facts the answers actually relied on. \
Relate events in the order they occurred. \
Write flowing prose. Do not use headings or bullet points.";

/// Seam over the summarization call so the manager can be exercised with
/// scripted implementations in tests.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Compress an ordered slice of messages, plus the retrieval context
    /// attached to any of them, into a single text blob.
    async fn summarize(
        &self,
        messages: &[ChatMessage],
        retrieved_contexts: &[String],
    ) -> Result<String, SummarizeError>;
}

/// Production summarizer: one bounded completion call per delta.
pub struct LlmSummarizer {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
    max_tokens: u32,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_prompt(messages: &[ChatMessage], retrieved_contexts: &[String]) -> String {
        let conversation = TokenCounter::count_conversation(messages).rendered;
        if retrieved_contexts.is_empty() {
            format!("Conversation to summarize:\n\n{conversation}")
        } else {
            format!(
                "Conversation to summarize:\n\n{conversation}\n\nDocumentation excerpts used in these answers:\n\n{}",
                retrieved_contexts.join(DOCUMENT_SEPARATOR)
            )
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        messages: &[ChatMessage],
        retrieved_contexts: &[String],
    ) -> Result<String, SummarizeError> {
        let req = CompletionRequest::new(Self::build_prompt(messages, retrieved_contexts))
            .with_system(SUMMARY_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens)
            .with_temperature(0.2);

        debug!(
            messages = messages.len(),
            contexts = retrieved_contexts.len(),
            "requesting summary"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.complete(req))
            .await
            .map_err(|_| SummarizeError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(SummarizeError::EmptyResult);
        }
        Ok(summary.to_string())
    }
}
