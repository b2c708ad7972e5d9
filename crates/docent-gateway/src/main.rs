//! Docent Gateway - Service Entry Point
//!
//! Wires providers, the vector store, and the context-window manager into
//! the HTTP surface and serves it.

use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docent_context::{ContextWindowManager, LlmSummarizer, SessionStore};
use docent_gateway::chat::ChatService;
use docent_gateway::config::{EmbeddingKind, GatewayConfig, ProviderKind};
use docent_gateway::indexing::SectionIndexer;
use docent_gateway::search::{RetrievalService, SemanticRetrievalService};
use docent_gateway::{build_routes, metrics, AppState};
use docent_runtime::{
    AnthropicProvider, CompletionProvider, EmbeddingProvider, MockEmbeddingProvider,
    OpenAIEmbeddingProvider, OpenAIProvider,
};
use docent_vector::{InMemoryVectorStore, VectorStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "docent_gateway=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Docent Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::from_env()?;
    let state = build_state(&config)?;
    metrics::init_metrics();

    let app = build_routes(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let embedding: Arc<dyn EmbeddingProvider> = match config.embedding {
        EmbeddingKind::OpenAI => Arc::new(OpenAIEmbeddingProvider::from_env()),
        EmbeddingKind::Mock => Arc::new(MockEmbeddingProvider::new(config.embedding_dimension)),
    };
    let vector_store: Arc<dyn VectorStore> =
        Arc::new(InMemoryVectorStore::new(embedding.dimension()));

    let provider: Arc<dyn CompletionProvider> = match config.provider {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_env()),
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_env()),
    };

    let summarizer = Arc::new(
        LlmSummarizer::new(Arc::clone(&provider))
            .with_timeout(Duration::from_secs(config.summary_timeout_secs)),
    );
    let manager = Arc::new(ContextWindowManager::new(
        Arc::new(SessionStore::new()),
        summarizer,
        config.context_config(),
    )?);

    let mut retrieval_service =
        SemanticRetrievalService::new(Arc::clone(&vector_store), Arc::clone(&embedding));
    if let Some(min_score) = config.retrieval_min_score {
        retrieval_service = retrieval_service.with_min_score(min_score);
    }
    let retrieval: Arc<dyn RetrievalService> = Arc::new(retrieval_service);

    let indexer = Arc::new(SectionIndexer::new(
        Arc::clone(&vector_store),
        Arc::clone(&embedding),
    ));

    let chat = Arc::new(
        ChatService::new(
            Arc::clone(&manager),
            Arc::clone(&retrieval),
            provider,
            config.system_prompt.clone(),
        )
        .with_retrieval_limit(config.retrieval_limit)
        .with_answer_max_tokens(config.answer_max_tokens),
    );

    Ok(AppState {
        chat,
        manager,
        retrieval,
        indexer,
    })
}
