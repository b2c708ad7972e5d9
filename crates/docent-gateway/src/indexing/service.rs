//! Ingestion service implementation

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use docent_protocol::ContentType;
use docent_runtime::{BatchEmbeddingRequest, EmbeddingProvider};
use docent_vector::prelude::*;

/// One documentation section as uploaded by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionUpload {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: ContentType,
}

/// Ingestion error type
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("vector storage error: {0}")]
    StorageError(String),

    #[error("invalid section: {0}")]
    InvalidSection(String),
}

/// Embeds uploaded sections and stores them for retrieval.
pub struct SectionIndexer {
    vector_store: Arc<dyn VectorStore>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl SectionIndexer {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            vector_store,
            embedding_provider,
        }
    }

    /// Embed and store a batch of sections. Returns the stored ids in
    /// upload order.
    pub async fn index_sections(
        &self,
        sections: Vec<SectionUpload>,
    ) -> Result<Vec<Uuid>, IndexError> {
        if sections.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = sections
            .iter()
            .find(|s| s.title.trim().is_empty() || s.content.trim().is_empty())
        {
            return Err(IndexError::InvalidSection(format!(
                "section '{}' has an empty title or content",
                bad.title
            )));
        }

        debug!(count = sections.len(), "embedding uploaded sections");

        let texts: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
        let embeddings = self
            .embedding_provider
            .embed_batch(BatchEmbeddingRequest::new(texts))
            .await
            .map_err(|e| IndexError::EmbeddingError(e.to_string()))?;

        if embeddings.embeddings.len() != sections.len() {
            return Err(IndexError::EmbeddingError(format!(
                "expected {} embeddings, got {}",
                sections.len(),
                embeddings.embeddings.len()
            )));
        }

        let mut ids = Vec::with_capacity(sections.len());
        for (upload, embedding) in sections.into_iter().zip(embeddings.embeddings) {
            let mut metadata = SectionMetadata::new(upload.title);
            metadata.content_type = upload.content_type;
            metadata.url = upload.url;

            let stored = StoredSection::new(Vector::new(embedding), upload.content, metadata);
            let id = self
                .vector_store
                .upsert(stored)
                .await
                .map_err(|e| IndexError::StorageError(e.to_string()))?;
            ids.push(id);
        }

        info!(indexed = ids.len(), "sections ingested");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_runtime::MockEmbeddingProvider;
    use docent_vector::InMemoryVectorStore;

    const DIM: usize = 32;

    fn indexer() -> (SectionIndexer, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new(DIM));
        let embedding = Arc::new(MockEmbeddingProvider::new(DIM));
        (
            SectionIndexer::new(Arc::clone(&store) as Arc<dyn VectorStore>, embedding),
            store,
        )
    }

    fn upload(title: &str, content: &str) -> SectionUpload {
        SectionUpload {
            title: title.to_string(),
            content: content.to_string(),
            url: None,
            content_type: ContentType::Markdown,
        }
    }

    #[tokio::test]
    async fn index_sections_stores_every_upload() {
        let (indexer, store) = indexer();

        let ids = indexer
            .index_sections(vec![
                upload("Pairing", "pairing steps"),
                upload("Resets", "reset steps"),
            ])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
        let first = store.get(ids[0]).await.unwrap();
        assert_eq!(first.metadata.title, "Pairing");
        assert_eq!(first.content, "pairing steps");
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let (indexer, store) = indexer();
        let ids = indexer.index_sections(Vec::new()).await.unwrap();
        assert!(ids.is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let (indexer, store) = indexer();

        let err = indexer
            .index_sections(vec![upload("Empty", "   ")])
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::InvalidSection(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
