//! Chat orchestration service

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docent_context::{ContextWindowManager, TokenBreakdown, TokenCounter};
use docent_protocol::{ChatMessage, ContentType, SessionId};
use docent_runtime::{CompletionProvider, CompletionRequest, ProviderError};

use crate::metrics;
use crate::search::{RetrievalError, RetrievalService, RetrievedSection};

const DEFAULT_RETRIEVAL_LIMIT: usize = 4;
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 1024;

/// One chat turn as submitted by a client. The client owns the message
/// history and sends the full authoritative list each turn; the gateway
/// never merges or reorders it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub query: String,
}

/// Source attribution for one retrieved section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttribution {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub content_type: ContentType,
    pub score: f32,
}

impl From<&RetrievedSection> for SourceAttribution {
    fn from(section: &RetrievedSection) -> Self {
        Self {
            title: section.title.clone(),
            url: section.url.clone(),
            content_type: section.content_type,
            score: section.score,
        }
    }
}

/// Completed chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub answer: String,
    pub sources: Vec<SourceAttribution>,
    pub usage: TokenBreakdown,
    /// Whether this turn crossed the summarization threshold.
    pub context_compacted: bool,
    /// The two messages recorded for this turn. Clients append these to
    /// their history verbatim; the assistant message carries the retrieval
    /// context that summarization folds in later.
    pub messages: Vec<ChatMessage>,
}

/// Chat orchestration error type
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("query cannot be empty")]
    EmptyQuery,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("completion failed: {0}")]
    Completion(#[from] ProviderError),
}

/// Per-turn orchestrator: retrieve, budget, complete, record.
pub struct ChatService {
    manager: Arc<ContextWindowManager>,
    retrieval: Arc<dyn RetrievalService>,
    provider: Arc<dyn CompletionProvider>,
    system_prompt: String,
    retrieval_limit: usize,
    answer_max_tokens: u32,
}

impl ChatService {
    pub fn new(
        manager: Arc<ContextWindowManager>,
        retrieval: Arc<dyn RetrievalService>,
        provider: Arc<dyn CompletionProvider>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            retrieval,
            provider,
            system_prompt: system_prompt.into(),
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            answer_max_tokens: DEFAULT_ANSWER_MAX_TOKENS,
        }
    }

    pub fn with_retrieval_limit(mut self, limit: usize) -> Self {
        self.retrieval_limit = limit;
        self
    }

    pub fn with_answer_max_tokens(mut self, max_tokens: u32) -> Self {
        self.answer_max_tokens = max_tokens;
        self
    }

    /// Handle one turn end to end.
    pub async fn handle(&self, req: ChatRequest) -> Result<ChatResponse, ChatError> {
        if req.query.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let sections = self
            .retrieval
            .retrieve(&req.query, self.retrieval_limit)
            .await?;
        let section_texts: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();

        let prepared = self
            .manager
            .manage_turn(
                &req.session_id,
                req.history,
                &section_texts,
                &self.system_prompt,
                &req.query,
            )
            .await;

        metrics::CHAT_TURNS_TOTAL.inc();
        metrics::PROMPT_TOKENS.observe(prepared.token_breakdown.total_tokens as f64);
        if prepared.needs_summarization {
            metrics::CONTEXT_COMPACTIONS_TOTAL.inc();
        }

        // Reuse the counter's own renderings so the sent prompt is exactly
        // what was counted.
        let documentation = TokenCounter::count_documents(&section_texts).rendered;
        let prompt = build_user_prompt(&documentation, &prepared.context_to_send, &req.query);

        debug!(
            session = %req.session_id,
            sections = sections.len(),
            total_tokens = prepared.token_breakdown.total_tokens,
            compacted = prepared.needs_summarization,
            "dispatching completion"
        );

        let completion_req = CompletionRequest::new(prompt)
            .with_system(self.system_prompt.clone())
            .with_max_tokens(self.answer_max_tokens);

        let provider_name = self.provider.name();
        metrics::COMPLETION_REQUESTS_TOTAL
            .with_label_values(&[provider_name])
            .inc();
        let started = Instant::now();
        let completion = match self.provider.complete(completion_req).await {
            Ok(completion) => completion,
            Err(err) => {
                metrics::COMPLETION_ERRORS_TOTAL
                    .with_label_values(&[provider_name])
                    .inc();
                return Err(err.into());
            }
        };
        metrics::COMPLETION_LATENCY
            .with_label_values(&[provider_name])
            .observe(started.elapsed().as_secs_f64());

        let retrieved_context = (!documentation.is_empty()).then(|| documentation.clone());
        let (user_message, assistant_message) = self
            .manager
            .record_turn(
                &req.session_id,
                &req.query,
                &completion.content,
                retrieved_context,
            )
            .await;

        info!(session = %req.session_id, "chat turn completed");

        Ok(ChatResponse {
            session_id: req.session_id,
            answer: completion.content,
            sources: sections.iter().map(SourceAttribution::from).collect(),
            usage: prepared.token_breakdown,
            context_compacted: prepared.needs_summarization,
            messages: vec![user_message, assistant_message],
        })
    }
}

/// Assemble the user-prompt body from the pre-rendered pieces.
fn build_user_prompt(documentation: &str, context: &str, query: &str) -> String {
    let mut prompt = String::new();
    if !documentation.is_empty() {
        prompt.push_str("Documentation:\n");
        prompt.push_str(documentation);
        prompt.push_str("\n\n");
    }
    if !context.is_empty() {
        prompt.push_str("Conversation so far:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    prompt.push_str("User question:\n");
    prompt.push_str(query);
    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use docent_context::{
        ContextWindowConfig, ContextWindowManager, LlmSummarizer, SessionStore,
    };
    use docent_protocol::{ChatMessage, SessionId};
    use docent_runtime::{CompletionProvider, MockCompletionProvider, ProviderError};

    use crate::search::{RetrievalError, RetrievalService, RetrievedSection};

    use super::{build_user_prompt, ChatError, ChatRequest, ChatService};

    /// Retrieval stub returning fixed sections.
    struct FixedRetrieval(Vec<RetrievedSection>);

    #[async_trait]
    impl RetrievalService for FixedRetrieval {
        async fn retrieve(
            &self,
            _query: &str,
            limit: usize,
        ) -> Result<Vec<RetrievedSection>, RetrievalError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn section(title: &str, content: &str) -> RetrievedSection {
        RetrievedSection {
            title: title.to_string(),
            content: content.to_string(),
            url: Some(format!("https://docs.example.com/{title}")),
            content_type: docent_protocol::ContentType::Markdown,
            score: 0.9,
        }
    }

    fn service(
        sections: Vec<RetrievedSection>,
        answerer: Arc<MockCompletionProvider>,
    ) -> ChatService {
        let summarizer_provider = Arc::new(MockCompletionProvider::new());
        let manager = ContextWindowManager::new(
            Arc::new(SessionStore::new()),
            Arc::new(LlmSummarizer::new(
                summarizer_provider as Arc<dyn CompletionProvider>,
            )),
            ContextWindowConfig::default(),
        )
        .unwrap();

        ChatService::new(
            Arc::new(manager),
            Arc::new(FixedRetrieval(sections)),
            answerer as Arc<dyn CompletionProvider>,
            "You answer from the documentation.",
        )
    }

    fn sid(raw: &str) -> SessionId {
        raw.parse().unwrap()
    }

    #[tokio::test]
    async fn turn_retrieves_completes_and_records() {
        let answerer = Arc::new(MockCompletionProvider::new());
        answerer.enqueue_content("Hold the reset button for 10 seconds.");
        let service = service(
            vec![section("Resets", "Reset procedure: hold button 10s.")],
            Arc::clone(&answerer),
        );

        let response = service
            .handle(ChatRequest {
                session_id: sid("s1"),
                history: vec![],
                query: "How do I reset?".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(response.answer, "Hold the reset button for 10 seconds.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].title, "Resets");
        assert!(!response.context_compacted);

        // The prompt contains the retrieved section and the question.
        let calls = answerer.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("Reset procedure: hold button 10s."));
        assert!(calls[0].prompt.contains("User question:\nHow do I reset?"));
        assert_eq!(
            calls[0].system.as_deref(),
            Some("You answer from the documentation.")
        );

        // record_turn appended the turn and attached provenance, and the
        // recorded pair is echoed for the client's next history upload.
        let stats = service.manager.stats(&sid("s1")).await.unwrap();
        assert_eq!(stats.message_count, 2);
        assert_eq!(response.messages.len(), 2);
        assert_eq!(
            response.messages[1].retrieved_context.as_deref(),
            Some("Reset procedure: hold button 10s.")
        );
    }

    #[tokio::test]
    async fn history_is_rendered_into_prompt() {
        let answerer = Arc::new(MockCompletionProvider::new());
        answerer.enqueue_content("answer");
        let service = service(vec![], Arc::clone(&answerer));

        service
            .handle(ChatRequest {
                session_id: sid("s2"),
                history: vec![
                    ChatMessage::user("Earlier question"),
                    ChatMessage::assistant("Earlier answer"),
                ],
                query: "Follow-up?".to_string(),
            })
            .await
            .unwrap();

        let calls = answerer.calls();
        assert!(calls[0]
            .prompt
            .contains("user: Earlier question\n\nassistant: Earlier answer"));
        // No retrieval hits, so no documentation block.
        assert!(!calls[0].prompt.contains("Documentation:"));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let answerer = Arc::new(MockCompletionProvider::new());
        let service = service(vec![], answerer);

        let err = service
            .handle(ChatRequest {
                session_id: sid("s3"),
                history: vec![],
                query: "  ".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::EmptyQuery));
    }

    #[tokio::test]
    async fn completion_failure_surfaces_and_records_nothing() {
        let answerer = Arc::new(MockCompletionProvider::new());
        answerer.enqueue(Err(ProviderError::Message("provider down".to_string())));
        let service = service(vec![], Arc::clone(&answerer));

        let err = service
            .handle(ChatRequest {
                session_id: sid("s4"),
                history: vec![],
                query: "hello".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Completion(_)));
        // The failed turn is not recorded.
        let stats = service.manager.stats(&sid("s4")).await.unwrap();
        assert_eq!(stats.message_count, 0);
    }

    #[test]
    fn prompt_assembly_orders_blocks() {
        let prompt = build_user_prompt("docs here", "history here", "question here");
        let docs = prompt.find("docs here").unwrap();
        let history = prompt.find("history here").unwrap();
        let question = prompt.find("question here").unwrap();
        assert!(docs < history && history < question);

        let bare = build_user_prompt("", "", "only question");
        assert_eq!(bare, "User question:\nonly question");
    }
}
