//! Per-turn context window orchestration
//!
//! `manage_turn` decides, once per turn, whether the conversation plus the
//! newly retrieved documentation still fits under the summarization
//! threshold. When it does not, the manager compacts exactly the slice of
//! older messages that has not been folded into the running summary yet.
//! Summaries accumulate: a compaction round only ever sees the new delta,
//! so the cost per round stays bounded regardless of conversation length.

use std::sync::Arc;

use tracing::{debug, info, warn};

use docent_protocol::{ChatMessage, ChatRole, SessionId};

use crate::config::ContextWindowConfig;
use crate::error::ContextResult;
use crate::session::{Session, SessionStats, SessionStore};
use crate::summarizer::Summarizer;
use crate::tokens::{TokenBreakdown, TokenCounter};

const SUMMARY_HEADER: &str = "Previous conversation summary:";
const RECENT_HEADER: &str = "Recent conversation:";
/// Joins an existing accumulated summary with a newly produced one.
const SUMMARY_SEPARATOR: &str = "\n\n";
/// How many delta messages the literal fallback excerpt keeps.
const FALLBACK_TAIL: usize = 3;
/// Per-message content cap inside the fallback excerpt.
const FALLBACK_CONTENT_CAP: usize = 400;

/// What a turn should send to the model, plus the accounting behind it.
#[derive(Debug, Clone)]
pub struct PreparedContext {
    /// Messages represented verbatim in `context_to_send`.
    pub processed_messages: Vec<ChatMessage>,
    /// History portion of the prompt, exactly as counted.
    pub context_to_send: String,
    /// Whether this turn crossed the summarization threshold.
    pub needs_summarization: bool,
    pub token_breakdown: TokenBreakdown,
}

/// The context window orchestrator.
pub struct ContextWindowManager {
    store: Arc<SessionStore>,
    summarizer: Arc<dyn Summarizer>,
    config: ContextWindowConfig,
}

impl ContextWindowManager {
    /// Build a manager, validating the configuration up front. A malformed
    /// deployment fails here, at startup, never during a turn.
    pub fn new(
        store: Arc<SessionStore>,
        summarizer: Arc<dyn Summarizer>,
        config: ContextWindowConfig,
    ) -> ContextResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            summarizer,
            config,
        })
    }

    pub fn config(&self) -> &ContextWindowConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one turn: adopt the caller's message list, count everything,
    /// and compact older history if the threshold is crossed.
    ///
    /// Never fails. A summarization failure degrades to a literal excerpt of
    /// the unsummarized delta for this turn only, leaving persisted
    /// summarization progress untouched so the same delta is retried next
    /// turn.
    pub async fn manage_turn(
        &self,
        session_id: &SessionId,
        messages: Vec<ChatMessage>,
        document_sections: &[String],
        system_prompt: &str,
        current_query: &str,
    ) -> PreparedContext {
        let entry = self.store.get_or_create(session_id).await;
        // Held across the summarizer await: turns for one session are
        // strictly serialized, so two racing turns cannot both summarize
        // the same delta.
        let mut session = entry.lock().await;

        // The caller owns message content; this subsystem only tracks
        // summarization progress against the supplied list.
        session.messages = messages;
        if let Some(last) = session.last_summarized {
            if last >= session.messages.len() {
                warn!(
                    session = %session_id,
                    last_summarized = last,
                    messages = session.messages.len(),
                    "caller supplied fewer messages than summarized; clamping progress"
                );
                session.last_summarized = session.messages.len().checked_sub(1);
                if session.last_summarized.is_none() {
                    session.summarized_context = None;
                }
            }
        }

        let token_breakdown = TokenCounter::count_all(
            system_prompt,
            &session.messages,
            document_sections,
            current_query,
        );
        let needs_summarization = token_breakdown.total_tokens > self.config.summarization_threshold;

        let prepared = if !needs_summarization
            || session.messages.len() <= self.config.preserve_recent
        {
            if needs_summarization {
                // Over threshold but every message falls inside the preserve
                // window: send over budget rather than summarize preserved
                // turns.
                warn!(
                    session = %session_id,
                    total_tokens = token_breakdown.total_tokens,
                    threshold = self.config.summarization_threshold,
                    "over threshold with nothing safe to compact"
                );
            }
            let full = TokenCounter::count_conversation(&session.messages);
            PreparedContext {
                processed_messages: session.messages.clone(),
                context_to_send: full.rendered,
                needs_summarization,
                token_breakdown,
            }
        } else {
            let split = session.messages.len() - self.config.preserve_recent;
            let recent = session.messages[split..].to_vec();

            let display_summary = self.compact_delta(&mut session, split).await;

            let rendered_recent = TokenCounter::count_conversation(&recent).rendered;
            let context_to_send = match display_summary {
                Some(summary) => format!(
                    "{SUMMARY_HEADER}\n{summary}\n\n{RECENT_HEADER}\n{rendered_recent}"
                ),
                None => rendered_recent,
            };

            PreparedContext {
                processed_messages: recent,
                context_to_send,
                needs_summarization,
                token_breakdown,
            }
        };

        session.total_tokens = prepared.token_breakdown.total_tokens;
        session.touch();
        prepared
    }

    /// Fold the not-yet-summarized portion of the pre-recent messages into
    /// the session's accumulated summary. Returns the summary text to show
    /// this turn (which, after a failure, may contain a literal excerpt that
    /// is never persisted).
    async fn compact_delta(&self, session: &mut Session, split: usize) -> Option<String> {
        let start = session.last_summarized.map_or(0, |i| i + 1);
        if start >= split {
            // Everything before the preserve window is already summarized.
            return session.summarized_context.clone();
        }

        let to_summarize = &session.messages[start..split];
        let retrieved: Vec<String> = to_summarize
            .iter()
            .filter_map(|m| m.retrieved_context.clone())
            .collect();

        debug!(
            session = %session.id,
            delta_start = start,
            delta_end = split - 1,
            attached_contexts = retrieved.len(),
            "summarizing delta"
        );

        match self.summarizer.summarize(to_summarize, &retrieved).await {
            Ok(new_summary) => {
                let merged = match session.summarized_context.take() {
                    Some(previous) => format!("{previous}{SUMMARY_SEPARATOR}{new_summary}"),
                    None => new_summary,
                };
                session.summarized_context = Some(merged.clone());
                session.last_summarized = Some(split - 1);
                info!(
                    session = %session.id,
                    last_summarized = split - 1,
                    "summary advanced"
                );
                Some(merged)
            }
            Err(err) => {
                warn!(
                    session = %session.id,
                    error = %err,
                    "summarization failed; substituting literal excerpt for this turn"
                );
                let excerpt = fallback_excerpt(to_summarize);
                Some(match &session.summarized_context {
                    Some(previous) => format!("{previous}{SUMMARY_SEPARATOR}{excerpt}"),
                    None => excerpt,
                })
            }
        }
    }

    /// Append the completed turn to the session and attach retrieval
    /// provenance to the answer. The attach step only decorates an
    /// assistant message; anything else is left untouched.
    ///
    /// Returns the recorded pair so the caller can echo it back to the
    /// client, which must include it (context attachment and all) in the
    /// next turn's authoritative message list.
    pub async fn record_turn(
        &self,
        session_id: &SessionId,
        query: &str,
        answer: &str,
        retrieved_context: Option<String>,
    ) -> (ChatMessage, ChatMessage) {
        let entry = self.store.get_or_create(session_id).await;
        let mut session = entry.lock().await;

        session.messages.push(ChatMessage::user(query));
        session.messages.push(ChatMessage::assistant(answer));

        if let Some(context) = retrieved_context.filter(|c| !c.is_empty()) {
            if let Some(last) = session.messages.last_mut() {
                if last.role == ChatRole::Assistant {
                    last.retrieved_context = Some(context);
                }
            }
        }
        session.touch();

        let recorded = session.messages.len() - 2;
        (
            session.messages[recorded].clone(),
            session.messages[recorded + 1].clone(),
        )
    }

    /// Aggregate stats, or `None` for an unknown session.
    pub async fn stats(&self, session_id: &SessionId) -> Option<SessionStats> {
        self.store.stats(session_id).await
    }

    /// Drop the session entirely. Returns whether it existed.
    pub async fn clear_session(&self, session_id: &SessionId) -> bool {
        self.store.clear(session_id).await
    }
}

/// Literal stand-in for a failed summary: the tail of the delta, rendered
/// verbatim with long contents truncated.
fn fallback_excerpt(messages: &[ChatMessage]) -> String {
    let tail_start = messages.len().saturating_sub(FALLBACK_TAIL);
    messages[tail_start..]
        .iter()
        .map(|m| {
            let mut content = m.content.clone();
            if content.chars().count() > FALLBACK_CONTENT_CAP {
                content = content.chars().take(FALLBACK_CONTENT_CAP).collect();
                content.push_str("...");
            }
            format!("{}: {}", m.role, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
