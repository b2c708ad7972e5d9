//! Docent Gateway - HTTP API layer
//!
//! This crate implements the service surface around the context-window
//! manager, handling:
//! - Chat turn orchestration (retrieve, budget, complete, record)
//! - Documentation ingestion and semantic search
//! - Session stats and lifecycle endpoints
//! - Health and Prometheus metrics

pub mod chat;
pub mod config;
pub mod indexing;
pub mod metrics;
pub mod router;
pub mod search;

pub use config::GatewayConfig;
pub use router::{build_routes, AppState};

/// Gateway version
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");
