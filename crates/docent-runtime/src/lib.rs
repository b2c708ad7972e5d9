//! Runtime abstractions for AI providers.
//!
//! Two seams are defined here: `CompletionProvider`, the single fallible
//! text-completion call every higher layer depends on, and
//! `EmbeddingProvider` for vector generation. Both come with queue-based
//! mock implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod embedding;
pub mod providers;

pub use embedding::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingRequest,
    EmbeddingResponse, EmbeddingUsage, MockEmbeddingProvider, OpenAIEmbeddingProvider,
};
pub use providers::{AnthropicProvider, OpenAIProvider};

/// A single completion call: an optional system prompt plus a user prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },
    #[error("mock provider has no queued response")]
    MockQueueEmpty,
    #[error("provider error: {0}")]
    Message(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

/// Queue-based stub provider. Each `complete` call pops the next scripted
/// result; an empty queue yields `ProviderError::MockQueueEmpty`.
#[derive(Debug, Default)]
pub struct MockCompletionProvider {
    queue: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, result: Result<CompletionResponse, ProviderError>) {
        self.queue
            .lock()
            .expect("mock completion queue poisoned")
            .push_back(result);
    }

    pub fn enqueue_content(&self, content: impl Into<String>) {
        self.enqueue(Ok(CompletionResponse {
            content: content.into(),
            model: Some("mock-1".to_string()),
            finish_reason: Some("stop".to_string()),
        }));
    }

    /// Requests seen so far, in call order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock call log poisoned").len()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(req);
        self.queue
            .lock()
            .expect("mock completion queue poisoned")
            .pop_front()
            .unwrap_or(Err(ProviderError::MockQueueEmpty))
    }
}
