//! Chat turn orchestration
//!
//! Glues the retrieval service, the context-window manager, and the
//! completion provider into the per-turn control flow.

mod service;

pub use service::{ChatError, ChatRequest, ChatResponse, ChatService, SourceAttribution};
