//! HTTP routes for Docent Gateway

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use docent_context::{ContextWindowManager, SessionStats};
use docent_protocol::SessionId;

use crate::chat::{ChatError, ChatRequest, ChatResponse, ChatService};
use crate::indexing::{IndexError, SectionIndexer, SectionUpload};
use crate::metrics;
use crate::search::{RetrievalError, RetrievalService, RetrievedSection};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub manager: Arc<ContextWindowManager>,
    pub retrieval: Arc<dyn RetrievalService>,
    pub indexer: Arc<SectionIndexer>,
}

/// Build the main router for the gateway
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(export_metrics))
        .route("/v1/chat", post(chat_turn))
        .route("/v1/documents", post(ingest_sections))
        .route("/v1/search", post(search_sections))
        .route("/v1/sessions/:id/stats", get(session_stats))
        .route("/v1/sessions/:id", delete(clear_session))
        .with_state(state)
}

/// Error envelope returned by every handler.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyQuery => Self::bad_request(err.to_string()),
            ChatError::Retrieval(RetrievalError::InvalidQuery(_)) => {
                Self::bad_request(err.to_string())
            }
            ChatError::Retrieval(_) | ChatError::Completion(_) => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
        }
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match &err {
            RetrievalError::InvalidQuery(_) => Self::bad_request(err.to_string()),
            _ => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        match &err {
            IndexError::InvalidSection(_) => Self::bad_request(err.to_string()),
            _ => Self::new(StatusCode::BAD_GATEWAY, err.to_string()),
        }
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::bad_request(format!("invalid session id: {e}")))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Prometheus metrics endpoint
async fn export_metrics() -> String {
    metrics::export()
}

async fn chat_turn(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.chat.handle(request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    sections: Vec<SectionUpload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    indexed: usize,
    ids: Vec<Uuid>,
}

async fn ingest_sections(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let ids = state.indexer.index_sections(request.sections).await?;
    metrics::SECTIONS_INDEXED_TOTAL.inc_by(ids.len() as f64);
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            indexed: ids.len(),
            ids,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchApiRequest {
    query: String,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchApiResponse {
    query: String,
    results: Vec<RetrievedSection>,
    total: usize,
}

async fn search_sections(
    State(state): State<AppState>,
    Json(request): Json<SearchApiRequest>,
) -> Result<Json<SearchApiResponse>, ApiError> {
    let results = state
        .retrieval
        .retrieve(&request.query, request.limit.unwrap_or(10))
        .await?;
    Ok(Json(SearchApiResponse {
        query: request.query,
        total: results.len(),
        results,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    session_id: SessionId,
    #[serde(flatten)]
    stats: SessionStats,
}

async fn session_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let stats = state
        .manager
        .stats(&session_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("unknown session '{session_id}'")))?;
    Ok(Json(StatsResponse { session_id, stats }))
}

async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = parse_session_id(&id)?;
    if state.manager.clear_session(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!(
            "unknown session '{session_id}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use docent_context::{
        ContextWindowConfig, ContextWindowManager, LlmSummarizer, SessionStore,
    };
    use docent_runtime::{
        CompletionProvider, MockCompletionProvider, MockEmbeddingProvider,
    };
    use docent_vector::{InMemoryVectorStore, VectorStore};

    use crate::chat::ChatService;
    use crate::indexing::SectionIndexer;
    use crate::search::{RetrievalService, SemanticRetrievalService};

    use super::{build_routes, AppState};

    const DIM: usize = 32;

    fn test_state(answerer: Arc<MockCompletionProvider>) -> AppState {
        let store = Arc::new(SessionStore::new());
        let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(DIM));
        let embedding = Arc::new(MockEmbeddingProvider::new(DIM));

        let summarizer_provider: Arc<dyn CompletionProvider> =
            Arc::new(MockCompletionProvider::new());
        let manager = Arc::new(
            ContextWindowManager::new(
                store,
                Arc::new(LlmSummarizer::new(summarizer_provider)),
                ContextWindowConfig::default(),
            )
            .unwrap(),
        );

        let retrieval: Arc<dyn RetrievalService> = Arc::new(SemanticRetrievalService::new(
            Arc::clone(&vector_store),
            Arc::clone(&embedding) as _,
        ));
        let indexer = Arc::new(SectionIndexer::new(
            Arc::clone(&vector_store),
            embedding as _,
        ));
        let chat = Arc::new(ChatService::new(
            Arc::clone(&manager),
            Arc::clone(&retrieval),
            answerer as Arc<dyn CompletionProvider>,
            "You answer from the documentation.",
        ));

        AppState {
            chat,
            manager,
            retrieval,
            indexer,
        }
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = build_routes(test_state(Arc::new(MockCompletionProvider::new())));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chat_turn_round_trips() {
        let answerer = Arc::new(MockCompletionProvider::new());
        answerer.enqueue_content("Here is the answer.");
        let app = build_routes(test_state(answerer));

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                serde_json::json!({
                    "sessionId": "sess-router",
                    "history": [],
                    "query": "How do I reset the hub?"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["answer"], "Here is the answer.");
        assert_eq!(payload["sessionId"], "sess-router");
        assert!(payload["usage"]["totalTokens"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let app = build_routes(test_state(Arc::new(MockCompletionProvider::new())));

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                serde_json::json!({
                    "sessionId": "sess-router",
                    "history": [],
                    "query": "   "
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ingest_then_search_finds_sections() {
        let app = build_routes(test_state(Arc::new(MockCompletionProvider::new())));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/documents",
                serde_json::json!({
                    "sections": [
                        {"title": "Pairing", "content": "pairing steps", "contentType": "markdown"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = body_json(response).await;
        assert_eq!(payload["indexed"], 1);

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/search",
                serde_json::json!({"query": "pairing steps", "limit": 5}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["total"], 1);
        assert_eq!(payload["results"][0]["title"], "Pairing");
    }

    #[tokio::test]
    async fn stats_for_unknown_session_is_not_found() {
        let app = build_routes(test_state(Arc::new(MockCompletionProvider::new())));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/sessions/ghost/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_then_stats_then_clear() {
        let answerer = Arc::new(MockCompletionProvider::new());
        answerer.enqueue_content("answer");
        let app = build_routes(test_state(answerer));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                serde_json::json!({
                    "sessionId": "sess-lifecycle",
                    "history": [],
                    "query": "hello?"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/sessions/sess-lifecycle/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        // The recorded turn holds the query and the answer.
        assert_eq!(payload["messageCount"], 2);
        assert_eq!(payload["hasSummary"], false);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/v1/sessions/sess-lifecycle")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/sessions/sess-lifecycle/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
