//! Documentation retrieval for chat turns
//!
//! This module provides:
//! - Query embedding and vector search over ingested sections
//! - Score filtering and result shaping for the chat orchestrator

mod service;

pub use service::{RetrievalError, RetrievalService, RetrievedSection, SemanticRetrievalService};
