//! Retrieval service implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use docent_protocol::ContentType;
use docent_runtime::{EmbeddingProvider, EmbeddingRequest};
use docent_vector::prelude::*;

/// One documentation excerpt handed to the chat orchestrator. The `content`
/// string feeds the context manager; everything else is passed through to
/// the client as source attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedSection {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub content_type: ContentType,
    pub score: f32,
}

impl From<SearchResult> for RetrievedSection {
    fn from(result: SearchResult) -> Self {
        Self {
            title: result.section.metadata.title,
            content: result.section.content,
            url: result.section.metadata.url,
            content_type: result.section.metadata.content_type,
            score: result.score,
        }
    }
}

/// Retrieval error type
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("vector search failed: {0}")]
    VectorError(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Retrieval service trait
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Fetch the sections most relevant to `query`, best first.
    async fn retrieve(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedSection>, RetrievalError>;
}

/// Embedding-backed retrieval over the vector store.
pub struct SemanticRetrievalService {
    vector_store: Arc<dyn VectorStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    min_score: Option<f32>,
}

impl SemanticRetrievalService {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            vector_store,
            embedding_provider,
            min_score: None,
        }
    }

    /// Drop matches scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .embedding_provider
            .embed(EmbeddingRequest::new(text))
            .await
            .map_err(|e| RetrievalError::EmbeddingError(e.to_string()))?;
        Ok(response.embedding)
    }
}

#[async_trait]
impl RetrievalService for SemanticRetrievalService {
    async fn retrieve(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievedSection>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query cannot be empty".to_string(),
            ));
        }

        debug!(%query, limit, "retrieving documentation");

        let embedding = self.embed_query(query).await?;
        let mut search_query = SearchQuery::new(Vector::new(embedding)).with_limit(limit);
        if let Some(min_score) = self.min_score {
            search_query = search_query.with_min_score(min_score);
        }

        let results = self
            .vector_store
            .search(search_query)
            .await
            .map_err(|e| RetrievalError::VectorError(e.to_string()))?;

        Ok(results.into_iter().map(RetrievedSection::from).collect())
    }
}
