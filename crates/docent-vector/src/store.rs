//! Vector store trait and implementations

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{VectorError, VectorResult};
use crate::types::{SearchQuery, SearchResult, StoredSection};

/// Vector store abstraction
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a documentation section
    async fn upsert(&self, section: StoredSection) -> VectorResult<Uuid>;

    /// Get a section by ID
    async fn get(&self, id: Uuid) -> VectorResult<StoredSection>;

    /// Delete a section
    async fn delete(&self, id: Uuid) -> VectorResult<()>;

    /// Search for similar sections
    async fn search(&self, query: SearchQuery) -> VectorResult<Vec<SearchResult>>;

    /// Number of stored sections
    async fn count(&self) -> VectorResult<usize>;

    /// Dimension of vectors in this store
    fn dimension(&self) -> usize;
}

/// In-memory vector store
pub struct InMemoryVectorStore {
    sections: Arc<RwLock<HashMap<Uuid, StoredSection>>>,
    dimension: usize,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            sections: Arc::new(RwLock::new(HashMap::new())),
            dimension,
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, section: StoredSection) -> VectorResult<Uuid> {
        if section.vector.dimensions != self.dimension {
            return Err(VectorError::InvalidDimension {
                expected: self.dimension,
                actual: section.vector.dimensions,
            });
        }
        let id = section.id;
        self.sections.write().await.insert(id, section);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> VectorResult<StoredSection> {
        self.sections
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| VectorError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: Uuid) -> VectorResult<()> {
        self.sections
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| VectorError::NotFound(id.to_string()))
    }

    async fn search(&self, query: SearchQuery) -> VectorResult<Vec<SearchResult>> {
        let sections = self.sections.read().await;
        let mut results: Vec<SearchResult> = sections
            .values()
            .filter(|s| {
                query
                    .content_type
                    .map_or(true, |ct| s.metadata.content_type == ct)
            })
            .map(|section| {
                let score = query.vector.cosine_similarity(&section.vector);
                SearchResult {
                    section: section.clone(),
                    score,
                }
            })
            .filter(|r| query.min_score.map_or(true, |min| r.score >= min))
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.limit);

        Ok(results)
    }

    async fn count(&self) -> VectorResult<usize> {
        Ok(self.sections.read().await.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectionMetadata, Vector};
    use docent_protocol::ContentType;

    fn section(data: Vec<f32>, content: &str) -> StoredSection {
        StoredSection::new(
            Vector::new(data),
            content.to_string(),
            SectionMetadata::new(content),
        )
    }

    #[tokio::test]
    async fn upsert_and_get_round_trip() {
        let store = InMemoryVectorStore::new(3);
        let doc = section(vec![1.0, 0.0, 0.0], "reset guide");

        let id = store.upsert(doc.clone()).await.unwrap();
        let retrieved = store.get(id).await.unwrap();

        assert_eq!(doc.content, retrieved.content);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new(3);
        let doc = section(vec![1.0, 0.0], "short vector");

        let err = store.upsert(doc).await.unwrap_err();
        assert!(matches!(
            err,
            VectorError::InvalidDimension {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let store = InMemoryVectorStore::new(3);

        store
            .upsert(section(vec![1.0, 0.0, 0.0], "exact"))
            .await
            .unwrap();
        store
            .upsert(section(vec![0.9, 0.1, 0.0], "close"))
            .await
            .unwrap();
        store
            .upsert(section(vec![0.0, 0.0, 1.0], "unrelated"))
            .await
            .unwrap();

        let query = SearchQuery::new(Vector::new(vec![1.0, 0.0, 0.0])).with_limit(2);
        let results = store.search(query).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].section.content, "exact");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn search_applies_min_score_and_content_type() {
        let store = InMemoryVectorStore::new(2);

        let mut markdown = section(vec![1.0, 0.0], "markdown doc");
        markdown.metadata.content_type = ContentType::Markdown;
        let mut html = section(vec![1.0, 0.0], "html doc");
        html.metadata.content_type = ContentType::Html;

        store.upsert(markdown).await.unwrap();
        store.upsert(html).await.unwrap();
        store
            .upsert(section(vec![0.0, 1.0], "orthogonal"))
            .await
            .unwrap();

        let query = SearchQuery::new(Vector::new(vec![1.0, 0.0]))
            .with_min_score(0.5)
            .with_content_type(ContentType::Markdown);
        let results = store.search(query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].section.content, "markdown doc");
    }

    #[tokio::test]
    async fn delete_removes_section() {
        let store = InMemoryVectorStore::new(2);
        let id = store
            .upsert(section(vec![1.0, 0.0], "to delete"))
            .await
            .unwrap();

        store.delete(id).await.unwrap();

        assert!(store.get(id).await.is_err());
        assert!(store.delete(id).await.is_err());
    }
}
