//! HTTP route handlers for the retrieval API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::rag::core::candidate::SearchHit;
use crate::rag::core::errors::RagError;
use crate::rag::engine::core::IngestReport;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/search", post(search))
        .route("/api/ingest", post(ingest))
        .route("/api/count", get(count))
        .route("/api/index", delete(clear_index))
        .with_state(state)
}

fn error_response(err: &RagError) -> (StatusCode, String) {
    let status = match err {
        RagError::InvalidQuery(_) | RagError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "halldyll-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Search request.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Free-text query.
    pub query: String,
    /// Number of results, defaults to the configured `top_k`.
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Heuristic rerank toggle, defaults to the configured value.
    #[serde(default)]
    pub rerank: Option<bool>,
    /// Site context enrichment toggle.
    #[serde(default = "default_enrich")]
    pub enrich: bool,
}

const fn default_enrich() -> bool {
    true
}

/// Search response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The query as received.
    pub query: String,
    /// Ranked hits.
    pub results: Vec<SearchHit>,
    /// Number of hits.
    pub count: usize,
    /// Search duration in milliseconds.
    pub took_ms: u128,
}

/// Hybrid search endpoint.
async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let started = Instant::now();
    let mut config = state.engine.config().hybrid_search.clone();
    if let Some(top_k) = request.top_k {
        config.top_k = top_k;
    }
    if let Some(rerank) = request.rerank {
        config.rerank = rerank;
    }

    let results = state
        .engine
        .search_with(&request.query, &config, request.enrich)
        .await
        .map_err(|err| error_response(&err))?;

    Ok(Json(SearchResponse {
        query: request.query,
        count: results.len(),
        results,
        took_ms: started.elapsed().as_millis(),
    }))
}

/// Ingest request.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Files to load and index, relative to the documents directory or
    /// absolute paths inside it.
    pub paths: Vec<PathBuf>,
}

/// Ingestion endpoint. Only files inside `data_source.documents_dir` are accepted.
async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, (StatusCode, String)> {
    let paths = state
        .engine
        .resolve_ingest_paths(&request.paths)
        .map_err(|err| error_response(&err))?;
    state
        .engine
        .ingest_paths(&paths)
        .await
        .map(Json)
        .map_err(|err| error_response(&err))
}

/// Count response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    /// Indexed chunks.
    pub count: usize,
}

/// Indexed chunk count endpoint.
async fn count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountResponse>, (StatusCode, String)> {
    let count = state
        .engine
        .count()
        .await
        .map_err(|err| error_response(&err))?;
    Ok(Json(CountResponse { count }))
}

/// Index wipe endpoint.
async fn clear_index(State(state): State<Arc<AppState>>) -> Result<StatusCode, (StatusCode, String)> {
    state
        .engine
        .clear()
        .await
        .map_err(|err| error_response(&err))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::rag::core::config::{EmbeddingProvider, RagConfig, VectorStoreKind};

    fn test_config() -> RagConfig {
        let mut config = RagConfig::default();
        config.embedding.provider = EmbeddingProvider::Hash;
        config.embedding.ndims = 32;
        config.vector_store.kind = VectorStoreKind::InMemory;
        config
    }

    async fn router() -> Router {
        create_router(AppState::new(test_config()).await.unwrap())
    }

    async fn router_with_documents(dir: &std::path::Path) -> Router {
        let mut config = test_config();
        config.data_source.documents_dir = Some(dir.to_path_buf());
        create_router(AppState::new(config).await.unwrap())
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_blank_query_is_bad_request() {
        let response = router()
            .await
            .oneshot(json_request("POST", "/api/search", &serde_json::json!({"query": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_zero_top_k_is_bad_request() {
        let response = router()
            .await
            .oneshot(json_request(
                "POST",
                "/api/search",
                &serde_json::json!({"query": "pricing", "top_k": 0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_count_search_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.txt");
        std::fs::write(
            &path,
            "Pricing plans: the starter plan is free and the team plan is billed monthly.",
        )
        .unwrap();

        let app = router_with_documents(dir.path()).await;
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ingest",
                &serde_json::json!({ "paths": [path] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: IngestReport = body_json(response).await;
        assert_eq!(report.documents, 1);
        assert!(report.chunks >= 1);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/count").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let counted: CountResponse = body_json(response).await;
        assert_eq!(counted.count, report.chunks);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/search",
                &serde_json::json!({"query": "pricing plans", "top_k": 1, "enrich": false}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let found: SearchResponse = body_json(response).await;
        assert_eq!(found.count, 1);
        assert!(found.results[0].content.contains("Pricing plans"));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/index")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_ingest_rejects_paths_outside_documents_dir() {
        let documents = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let secret = elsewhere.path().join("secret.txt");
        std::fs::write(&secret, "Private notes that must never be indexed by the service.").unwrap();

        let app = router_with_documents(documents.path()).await;
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/ingest",
                &serde_json::json!({ "paths": [secret] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(Request::builder().uri("/api/count").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let counted: CountResponse = body_json(response).await;
        assert_eq!(counted.count, 0);
    }

    #[tokio::test]
    async fn test_ingest_without_documents_dir_is_bad_request() {
        let response = router()
            .await
            .oneshot(json_request(
                "POST",
                "/api/ingest",
                &serde_json::json!({ "paths": ["notes.txt"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
