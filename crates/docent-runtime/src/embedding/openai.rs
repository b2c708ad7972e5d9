//! OpenAI Embedding Provider
//!
//! Implements the EmbeddingProvider trait for OpenAI's Embeddings API,
//! with bounded exponential-backoff retries on transient failures.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::embedding::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingRequest,
    EmbeddingResponse, EmbeddingUsage, DEFAULT_EMBEDDING_DIMENSION,
};
use crate::ProviderError;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Debug)]
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    dimension: usize,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OpenAIEmbeddingProvider {
    pub fn from_env() -> Self {
        let api_key =
            env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");

        let base_url = env::var("OPENAI_API_BASE").unwrap_or_else(|_| OPENAI_API_BASE.to_string());

        let default_model =
            env::var("OPENAI_EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let dimension = match default_model.as_str() {
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            _ => DEFAULT_EMBEDDING_DIMENSION,
        };

        Self::new(api_key, base_url, default_model, dimension)
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            dimension,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = retry_base_delay;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn get_model(&self, req_model: Option<&String>) -> String {
        req_model
            .cloned()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// POST the request body, retrying transient failures with exponential
    /// backoff, and decode the common response envelope.
    async fn send_with_retries(
        &self,
        body: &EmbeddingRequestBody,
    ) -> Result<EmbeddingResponseBody, ProviderError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.send_once(body).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let retriable = is_retriable(&err);
                    last_error = Some(err.to_string());
                    if retriable && attempt < self.max_retries {
                        tokio::time::sleep(backoff(self.retry_base_delay, attempt)).await;
                        continue;
                    }
                    if retriable {
                        return Err(ProviderError::RetryExhausted {
                            attempts: attempt + 1,
                            last_error: last_error
                                .unwrap_or_else(|| "unknown retry error".to_string()),
                        });
                    }
                    return Err(err);
                }
            }
        }

        Err(ProviderError::RetryExhausted {
            attempts: self.max_retries + 1,
            last_error: last_error.unwrap_or_else(|| "unknown retry error".to_string()),
        })
    }

    async fn send_once(
        &self,
        body: &EmbeddingRequestBody,
    ) -> Result<EmbeddingResponseBody, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("/embeddings"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequestBody {
    input: EmbeddingInput,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EmbeddingResponseBody {
    object: String,
    data: Vec<EmbeddingData>,
    model: String,
    usage: OpenAIUsage,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct EmbeddingData {
    object: String,
    index: u32,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

fn is_retriable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Transport(_) => true,
        ProviderError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1_u32 << attempt)
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let model = self.get_model(req.model.as_ref());
        let body = EmbeddingRequestBody {
            input: EmbeddingInput::Single(req.text),
            model,
            dimensions: None,
        };

        let resp = self.send_with_retries(&body).await?;
        let data = resp
            .data
            .first()
            .ok_or_else(|| ProviderError::Decode("No embedding data in response".to_string()))?;

        Ok(EmbeddingResponse {
            embedding: data.embedding.clone(),
            model: resp.model,
            dimension: data.embedding.len(),
            usage: Some(EmbeddingUsage::new(
                resp.usage.prompt_tokens,
                resp.usage.total_tokens,
            )),
        })
    }

    async fn embed_batch(
        &self,
        req: BatchEmbeddingRequest,
    ) -> Result<BatchEmbeddingResponse, ProviderError> {
        if req.texts.is_empty() {
            return Ok(BatchEmbeddingResponse {
                embeddings: Vec::new(),
                model: self.default_model.clone(),
                dimension: self.dimension,
                usage: None,
            });
        }

        let model = self.get_model(req.model.as_ref());
        let body = EmbeddingRequestBody {
            input: EmbeddingInput::Batch(req.texts),
            model,
            dimensions: None,
        };

        let resp = self.send_with_retries(&body).await?;

        // The API may return entries out of order; index is authoritative.
        let mut embeddings: Vec<(u32, Vec<f32>)> = resp
            .data
            .into_iter()
            .map(|d| (d.index, d.embedding))
            .collect();
        embeddings.sort_by_key(|(idx, _)| *idx);

        Ok(BatchEmbeddingResponse {
            embeddings: embeddings.into_iter().map(|(_, emb)| emb).collect(),
            model: resp.model,
            dimension: self.dimension,
            usage: Some(EmbeddingUsage::new(
                resp.usage.prompt_tokens,
                resp.usage.total_tokens,
            )),
        })
    }
}
