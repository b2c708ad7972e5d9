//! Docent Context Management - Token budgeting and incremental summarization
//!
//! This crate decides, for every turn of a multi-turn conversation, how much
//! history and retrieved documentation fits under a fixed token budget, and
//! compresses older turns when the budget would otherwise be exceeded.
//!
//! It provides:
//! - `TokenCounter`: deterministic token estimation coupled to the exact
//!   rendered text that is later sent to the model
//! - `SessionStore`: the in-memory per-conversation state map
//! - `Summarizer`: the seam over the LLM call that compresses old turns
//! - `ContextWindowManager`: the per-turn orchestrator

pub mod config;
pub mod error;
pub mod manager;
pub mod session;
pub mod summarizer;
pub mod tokens;

pub use config::ContextWindowConfig;
pub use error::{ContextError, ContextResult, SummarizeError};
pub use manager::{ContextWindowManager, PreparedContext};
pub use session::{Session, SessionStats, SessionStore};
pub use summarizer::{LlmSummarizer, Summarizer};
pub use tokens::{CountedText, TokenBreakdown, TokenCounter};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::ContextWindowConfig;
    pub use crate::error::{ContextError, ContextResult, SummarizeError};
    pub use crate::manager::{ContextWindowManager, PreparedContext};
    pub use crate::session::{SessionStats, SessionStore};
    pub use crate::summarizer::{LlmSummarizer, Summarizer};
    pub use crate::tokens::{TokenBreakdown, TokenCounter};
}
