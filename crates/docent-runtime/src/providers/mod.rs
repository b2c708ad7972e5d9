//! Completion provider implementations
//!
//! Concrete implementations of the `CompletionProvider` trait for hosted
//! AI services (Anthropic, OpenAI).

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;
