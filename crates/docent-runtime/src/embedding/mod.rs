//! Embedding provider trait and implementations
//!
//! Embedding generation for the documentation retrieval boundary: queries
//! and ingested sections are embedded through the same provider so their
//! vectors are comparable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ProviderError;

pub mod openai;

pub use openai::OpenAIEmbeddingProvider;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub text: String,
    pub model: Option<String>,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimension: usize,
    pub usage: Option<EmbeddingUsage>,
}

impl EmbeddingResponse {
    pub fn new(embedding: Vec<f32>, model: impl Into<String>) -> Self {
        let dimension = embedding.len();
        Self {
            embedding,
            model: model.into(),
            dimension,
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

impl EmbeddingUsage {
    pub fn new(prompt_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            total_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEmbeddingRequest {
    pub texts: Vec<String>,
    pub model: Option<String>,
}

impl BatchEmbeddingRequest {
    pub fn new(texts: Vec<String>) -> Self {
        Self { texts, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub dimension: usize,
    pub usage: Option<EmbeddingUsage>,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn dimension(&self) -> usize;

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError>;

    async fn embed_batch(
        &self,
        req: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, ProviderError>;
}

/// Test stub. Produces a deterministic pseudo-embedding derived from the
/// input bytes, so equal texts map to equal vectors and ranking tests can
/// distinguish unequal ones. Queued responses take precedence.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    queue: std::sync::Mutex<Vec<Result<EmbeddingResponse, ProviderError>>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            queue: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, result: Result<EmbeddingResponse, ProviderError>) {
        self.queue.lock().unwrap().push(result);
    }

    fn pseudo_embedding(&self, text: &str) -> Vec<f32> {
        let mut acc: u32 = 2_166_136_261;
        for b in text.bytes() {
            acc ^= u32::from(b);
            acc = acc.wrapping_mul(16_777_619);
        }
        (0..self.dimension)
            .map(|i| {
                let h = acc.wrapping_add(i as u32).wrapping_mul(2_654_435_761);
                (h % 1000) as f32 / 1000.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &'static str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let mut queue = self.queue.lock().unwrap();
        if let Some(result) = queue.pop() {
            result
        } else {
            Ok(EmbeddingResponse::new(
                self.pseudo_embedding(&req.text),
                "mock-embedding-model",
            ))
        }
    }

    async fn embed_batch(
        &self,
        req: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, ProviderError> {
        let count = req.texts.len();
        let embeddings = req
            .texts
            .iter()
            .map(|t| self.pseudo_embedding(t))
            .collect();
        Ok(BatchEmbeddingResponse {
            embeddings,
            model: "mock-embedding-model".to_string(),
            dimension: self.dimension,
            usage: Some(EmbeddingUsage::new(count as u32 * 10, count as u32 * 10)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_request_builder() {
        let req = EmbeddingRequest::new("hello world").with_model("text-embedding-3-small");
        assert_eq!(req.text, "hello world");
        assert_eq!(req.model, Some("text-embedding-3-small".to_string()));
    }

    #[test]
    fn embedding_response_tracks_dimension() {
        let resp = EmbeddingResponse::new(vec![0.1, 0.2, 0.3], "test-model");
        assert_eq!(resp.dimension, 3);
        assert_eq!(resp.model, "test-model");
    }

    #[tokio::test]
    async fn mock_provider_is_deterministic_per_text() {
        let provider = MockEmbeddingProvider::new(64);

        let a = provider.embed(EmbeddingRequest::new("reset")).await.unwrap();
        let b = provider.embed(EmbeddingRequest::new("reset")).await.unwrap();
        let c = provider
            .embed(EmbeddingRequest::new("firmware"))
            .await
            .unwrap();

        assert_eq!(a.embedding, b.embedding);
        assert_ne!(a.embedding, c.embedding);
        assert_eq!(a.embedding.len(), 64);
    }

    #[tokio::test]
    async fn mock_provider_returns_queued_response_first() {
        let provider = MockEmbeddingProvider::new(128);
        provider.enqueue(Ok(EmbeddingResponse::new(vec![1.0; 64], "custom-model")));

        let resp = provider.embed(EmbeddingRequest::new("test")).await.unwrap();
        assert_eq!(resp.dimension, 64);
        assert_eq!(resp.model, "custom-model");
    }

    #[tokio::test]
    async fn mock_provider_batch_matches_single(){
        let provider = MockEmbeddingProvider::new(32);
        let batch = provider
            .embed_batch(BatchEmbeddingRequest::new(vec![
                "a".to_string(),
                "b".to_string(),
            ]))
            .await
            .unwrap();
        let single = provider.embed(EmbeddingRequest::new("a")).await.unwrap();

        assert_eq!(batch.embeddings.len(), 2);
        assert_eq!(batch.embeddings[0], single.embedding);
        assert!(batch.usage.is_some());
    }
}
