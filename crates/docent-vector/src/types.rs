//! Core types for vector storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docent_protocol::ContentType;

/// Vector representation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vector {
    pub dimensions: usize,
    pub data: Vec<f32>,
}

impl Vector {
    pub fn new(data: Vec<f32>) -> Self {
        let dimensions = data.len();
        Self { dimensions, data }
    }

    /// Cosine similarity with another vector. Mismatched dimensions and
    /// zero-magnitude vectors score 0.
    pub fn cosine_similarity(&self, other: &Vector) -> f32 {
        if self.dimensions != other.dimensions {
            return 0.0;
        }

        let dot: f32 = self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum();
        let mag_a: f32 = self.data.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = other.data.iter().map(|x| x * x).sum::<f32>().sqrt();

        if mag_a == 0.0 || mag_b == 0.0 {
            0.0
        } else {
            dot / (mag_a * mag_b)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.data.is_empty() {
            return Err("vector cannot be empty".to_string());
        }
        if self.dimensions != self.data.len() {
            return Err(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimensions,
                self.data.len()
            ));
        }
        Ok(())
    }
}

/// Provenance of a documentation section: what the API layer passes back to
/// clients as source attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub title: String,
    pub url: Option<String>,
    pub content_type: ContentType,
}

impl SectionMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            content_type: ContentType::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }
}

/// A documentation section with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSection {
    pub id: Uuid,
    pub vector: Vector,
    pub metadata: SectionMetadata,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSection {
    pub fn new(vector: Vector, content: String, metadata: SectionMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vector,
            metadata,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(
        id: Uuid,
        vector: Vector,
        content: String,
        metadata: SectionMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            vector,
            metadata,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Search query over stored sections.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub vector: Vector,
    pub limit: usize,
    pub min_score: Option<f32>,
    /// Restrict matches to one section format.
    pub content_type: Option<ContentType>,
}

impl SearchQuery {
    pub fn new(vector: Vector) -> Self {
        Self {
            vector,
            limit: 10,
            min_score: None,
            content_type: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

/// One ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub section: StoredSection,
    pub score: f32,
}
