//! Token counting over the four prompt categories
//!
//! The counter returns, together with every count, the exact rendered text
//! that was counted. Callers must reuse that rendering verbatim when
//! assembling the final prompt - re-rendering with different separators
//! would silently drift the sent token count away from the counted value.

use serde::{Deserialize, Serialize};

use docent_protocol::ChatMessage;

/// Separator between documentation sections in the rendered prompt.
pub const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// Separator between rendered conversation messages.
const MESSAGE_SEPARATOR: &str = "\n\n";

/// A token count paired with the exact text it measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedText {
    pub tokens: usize,
    pub rendered: String,
}

/// Per-category token accounting for one prospective prompt.
/// `total_tokens` is always the exact sum of the other four fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBreakdown {
    pub system_tokens: usize,
    pub history_tokens: usize,
    pub documentation_tokens: usize,
    pub query_tokens: usize,
    pub total_tokens: usize,
}

/// Deterministic text-to-token estimator.
///
/// The estimate is ceil(chars / 4), the conventional approximation for
/// English prose under BPE tokenizers. Counting Unicode scalars rather than
/// bytes keeps multi-byte text from over-counting. Empty text counts zero,
/// and appending non-empty text never decreases the count.
pub struct TokenCounter;

impl TokenCounter {
    /// Estimate the token count of arbitrary text.
    pub fn count(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    /// Render one message the way it appears in the prompt.
    pub fn render_message(message: &ChatMessage) -> String {
        format!("{}: {}", message.role, message.content)
    }

    /// Render and count an ordered conversation slice.
    pub fn count_conversation(messages: &[ChatMessage]) -> CountedText {
        let rendered = messages
            .iter()
            .map(Self::render_message)
            .collect::<Vec<_>>()
            .join(MESSAGE_SEPARATOR);
        CountedText {
            tokens: Self::count(&rendered),
            rendered,
        }
    }

    /// Render and count retrieved documentation sections.
    pub fn count_documents(sections: &[String]) -> CountedText {
        let rendered = sections.join(DOCUMENT_SEPARATOR);
        CountedText {
            tokens: Self::count(&rendered),
            rendered,
        }
    }

    /// Count all four prompt categories.
    pub fn count_all(
        system_prompt: &str,
        messages: &[ChatMessage],
        document_sections: &[String],
        current_query: &str,
    ) -> TokenBreakdown {
        let system_tokens = Self::count(system_prompt);
        let history_tokens = Self::count_conversation(messages).tokens;
        let documentation_tokens = Self::count_documents(document_sections).tokens;
        let query_tokens = Self::count(current_query);

        TokenBreakdown {
            system_tokens,
            history_tokens,
            documentation_tokens,
            query_tokens,
            total_tokens: system_tokens + history_tokens + documentation_tokens + query_tokens,
        }
    }
}
