//! Gateway configuration
//!
//! All knobs come from `DOCENT_*` environment variables with validated
//! defaults. Misconfiguration fails at startup, never during a turn.

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Context;

use docent_context::ContextWindowConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_TOKENS: usize = 8192;
const DEFAULT_PRESERVE_RECENT: usize = 10;
const DEFAULT_RETRIEVAL_LIMIT: usize = 4;
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 1024;
const DEFAULT_SUMMARY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a support assistant for connected-device installations. \
Answer strictly from the documentation excerpts and conversation provided. \
If the documentation does not cover the question, say so instead of guessing.";

/// Which hosted service answers chat turns and produces summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => anyhow::bail!("unknown provider '{other}' (expected anthropic or openai)"),
        }
    }
}

/// Which embedding backend serves retrieval. `Mock` runs without API keys
/// for local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    OpenAI,
    Mock,
}

impl FromStr for EmbeddingKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            other => anyhow::bail!("unknown embedding backend '{other}' (expected openai or mock)"),
        }
    }
}

/// Deployment configuration for the gateway binary.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub provider: ProviderKind,
    pub embedding: EmbeddingKind,
    pub embedding_dimension: usize,
    pub system_prompt: String,
    pub max_tokens: usize,
    pub summarization_threshold: Option<usize>,
    pub preserve_recent: usize,
    pub retrieval_limit: usize,
    pub retrieval_min_score: Option<f32>,
    pub answer_max_tokens: u32,
    pub summary_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind addr parses"),
            provider: ProviderKind::Anthropic,
            embedding: EmbeddingKind::OpenAI,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            summarization_threshold: None,
            preserve_recent: DEFAULT_PRESERVE_RECENT,
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            retrieval_min_score: None,
            answer_max_tokens: DEFAULT_ANSWER_MAX_TOKENS,
            summary_timeout_secs: DEFAULT_SUMMARY_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from `DOCENT_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DOCENT_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("DOCENT_BIND_ADDR '{addr}' is not a socket address"))?;
        }
        if let Ok(provider) = std::env::var("DOCENT_PROVIDER") {
            config.provider = provider.parse().context("DOCENT_PROVIDER")?;
        }
        if let Ok(embedding) = std::env::var("DOCENT_EMBEDDING") {
            config.embedding = embedding.parse().context("DOCENT_EMBEDDING")?;
        }
        if let Ok(dimension) = std::env::var("DOCENT_EMBEDDING_DIMENSION") {
            config.embedding_dimension = parse_env("DOCENT_EMBEDDING_DIMENSION", &dimension)?;
        }
        if let Ok(prompt) = std::env::var("DOCENT_SYSTEM_PROMPT") {
            config.system_prompt = prompt;
        }
        if let Ok(max_tokens) = std::env::var("DOCENT_MAX_TOKENS") {
            config.max_tokens = parse_env("DOCENT_MAX_TOKENS", &max_tokens)?;
        }
        if let Ok(threshold) = std::env::var("DOCENT_SUMMARIZATION_THRESHOLD") {
            config.summarization_threshold =
                Some(parse_env("DOCENT_SUMMARIZATION_THRESHOLD", &threshold)?);
        }
        if let Ok(preserve) = std::env::var("DOCENT_PRESERVE_RECENT") {
            config.preserve_recent = parse_env("DOCENT_PRESERVE_RECENT", &preserve)?;
        }
        if let Ok(limit) = std::env::var("DOCENT_RETRIEVAL_LIMIT") {
            config.retrieval_limit = parse_env("DOCENT_RETRIEVAL_LIMIT", &limit)?;
        }
        if let Ok(min_score) = std::env::var("DOCENT_RETRIEVAL_MIN_SCORE") {
            config.retrieval_min_score =
                Some(parse_env("DOCENT_RETRIEVAL_MIN_SCORE", &min_score)?);
        }
        if let Ok(max_tokens) = std::env::var("DOCENT_ANSWER_MAX_TOKENS") {
            config.answer_max_tokens = parse_env("DOCENT_ANSWER_MAX_TOKENS", &max_tokens)?;
        }
        if let Ok(timeout) = std::env::var("DOCENT_SUMMARY_TIMEOUT_SECS") {
            config.summary_timeout_secs = parse_env("DOCENT_SUMMARY_TIMEOUT_SECS", &timeout)?;
        }

        // Surface context-window misconfiguration here, before serving.
        config.context_config().validate()?;
        Ok(config)
    }

    /// Context-window knobs derived from this deployment.
    pub fn context_config(&self) -> ContextWindowConfig {
        let mut context = ContextWindowConfig::for_budget(self.max_tokens)
            .with_preserve_recent(self.preserve_recent);
        if let Some(threshold) = self.summarization_threshold {
            context = context.with_summarization_threshold(threshold);
        }
        context
    }
}

fn parse_env<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("{name} '{raw}' is invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_produces_valid_context_config() {
        let config = GatewayConfig::default();
        let context = config.context_config();
        assert!(context.validate().is_ok());
        assert_eq!(context.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(context.preserve_recent, DEFAULT_PRESERVE_RECENT);
    }

    #[test]
    fn explicit_threshold_overrides_derived_one() {
        let config = GatewayConfig {
            summarization_threshold: Some(5000),
            ..GatewayConfig::default()
        };
        assert_eq!(config.context_config().summarization_threshold, 5000);
    }

    #[test]
    fn provider_kind_parses_known_values() {
        assert_eq!(
            "anthropic".parse::<ProviderKind>().unwrap(),
            ProviderKind::Anthropic
        );
        assert_eq!(
            "OpenAI".parse::<ProviderKind>().unwrap(),
            ProviderKind::OpenAI
        );
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn embedding_kind_parses_known_values() {
        assert_eq!(
            "mock".parse::<EmbeddingKind>().unwrap(),
            EmbeddingKind::Mock
        );
        assert!("local".parse::<EmbeddingKind>().is_err());
    }

    #[test]
    fn invalid_threshold_fails_validation() {
        let config = GatewayConfig {
            max_tokens: 1000,
            summarization_threshold: Some(1000),
            ..GatewayConfig::default()
        };
        assert!(config.context_config().validate().is_err());
    }
}
