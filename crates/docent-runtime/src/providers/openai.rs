//! OpenAI API Provider
//!
//! Implements the CompletionProvider trait for OpenAI's Chat Completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::{CompletionProvider, CompletionRequest, CompletionResponse, ProviderError};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    pub default_model: String,
}

impl OpenAIProvider {
    pub fn from_env() -> Self {
        let api_key =
            env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY environment variable must be set");

        let base_url = env::var("OPENAI_API_BASE").unwrap_or_else(|_| OPENAI_API_BASE.to_string());

        let default_model =
            env::var("OPENAI_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self::new(api_key, base_url, default_model)
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn get_model(&self, req: &CompletionRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ChatCompletionsResponse {
    id: String,
    model: String,
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system.clone() {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: req.prompt.clone(),
        });

        let openai_req = ChatCompletionsRequest {
            model: self.get_model(&req),
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        let response = self
            .client
            .post(self.endpoint("/chat/completions"))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&openai_req)
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

        let openai_resp: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let choice = openai_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("response contained no choices".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: Some(openai_resp.model),
            finish_reason: choice.finish_reason,
        })
    }
}
