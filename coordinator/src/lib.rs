//! Coordinator service: accepts documents for ingestion, fans queries out to
//! the index shards and returns hydrated, ranked documents.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use search_core::api::{decode_json, json_response, method_not_allowed, Ack, ApiError};
use search_core::shutdown::Shutdown;
use search_core::tokenizer::tokenize;
use search_core::{DocId, Line};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod document_store;
pub mod fetch;
pub mod line_store;
pub mod pipeline;
pub mod query;
pub mod shards;

use config::CoordinatorConfig;
use document_store::DocumentStore;
use fetch::Fetcher;
use line_store::LineStore;
use pipeline::{FeedRequest, IngestionPipeline, Ingestor};
use query::QueryCoordinator;
use shards::Shards;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub documents: DocumentStore,
    pub lines: LineStore,
    pub queries: Arc<QueryCoordinator>,
}

pub struct Coordinator {
    pub state: AppState,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl Coordinator {
    pub fn start(config: &CoordinatorConfig, fetcher: Arc<dyn Fetcher>, shards: Shards) -> Self {
        let shutdown = Shutdown::new();
        let mailbox = config.mailbox_capacity;
        let (documents, documents_task) = DocumentStore::spawn(mailbox, shutdown.subscribe());
        let (lines, lines_task) = LineStore::spawn(mailbox, shutdown.subscribe());

        let ingestor = Ingestor::new(fetcher, documents.clone(), lines.clone(), shards.clone());
        let (pipeline, mut tasks) = IngestionPipeline::start(
            ingestor,
            config.workers,
            config.queue_capacity,
            shutdown.subscribe(),
        );
        tasks.push(documents_task);
        tasks.push(lines_task);

        let queries =
            Arc::new(QueryCoordinator::new(shards, documents.clone(), config.shard_timeout));
        let state = AppState { pipeline, documents, lines, queries };
        Self { state, shutdown, tasks }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    /// Signal every actor and worker to stop and wait for them to exit.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!("coordinator task ended abnormally: {}", e);
            }
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/feeder",
            post(feed_handler).get(list_handler).fallback(method_not_allowed),
        )
        .route("/api/feeder/:doc_id", get(document_handler).fallback(method_not_allowed))
        .route("/api/query", post(query_handler).fallback(method_not_allowed))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn feed_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Ack>), ApiError> {
    let request: FeedRequest = decode_json(&body)?;
    if request.url.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing document url.".into()));
    }

    state.pipeline.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(Ack::new(StatusCode::OK, "Request is being processed."))))
}

pub async fn list_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let documents = state.documents.get_all().await?;
    json_response(StatusCode::OK, &documents)
}

#[derive(Serialize)]
pub struct DocumentView {
    pub title: String,
    pub doc_id: DocId,
    pub lines: Vec<Line>,
}

pub async fn document_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Response, ApiError> {
    let document = state
        .documents
        .get(&doc_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {doc_id} not found.")))?;

    let mut lines = Vec::new();
    for line in tokenize(&document.raw_text) {
        if let Some(stored) = state.lines.get(&doc_id, line.line_index).await? {
            lines.push(stored);
        }
    }
    let view = DocumentView { title: document.title, doc_id: document.doc_id, lines };
    json_response(StatusCode::OK, &view)
}

pub async fn query_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let terms: Vec<String> = decode_json(&body)?;

    let documents = state.queries.query(&terms).await?;
    json_response(StatusCode::OK, &documents)
}
