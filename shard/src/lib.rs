//! Index shard service: owns one partition of the inverted index and answers
//! ranked term queries against it.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use search_core::api::{decode_json, json_response, method_not_allowed, Ack, ApiError};
use search_core::tokenizer::normalize;
use search_core::TokenOccurrence;
use tower_http::trace::TraceLayer;

pub mod actor;
pub mod query;

use actor::IndexHandle;

#[derive(Clone)]
pub struct AppState {
    pub index: IndexHandle,
}

pub fn build_app(index: IndexHandle) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/index", post(index_handler).fallback(method_not_allowed))
        .route("/api/query", post(query_handler).fallback(method_not_allowed))
        .route("/api/stats", get(stats_handler).fallback(method_not_allowed))
        .with_state(AppState { index })
        .layer(TraceLayer::new_for_http())
}

pub async fn index_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    let mut occurrence: TokenOccurrence = decode_json(&body)?;

    let (token, valid) = normalize(&occurrence.token);
    if !valid {
        return Err(ApiError::BadRequest(format!("Invalid token {:?}.", occurrence.token)));
    }
    occurrence.token = token;
    tracing::debug!(token = %occurrence.token, doc_id = %occurrence.doc_id, "token received");

    state.index.add_token(occurrence).await?;
    Ok(Json(Ack::new(StatusCode::OK, "Token added to index.")))
}

pub async fn query_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let terms: Vec<String> = decode_json(&body)?;

    let results = query::search(&state.index, &terms).await?;
    json_response(StatusCode::OK, &results)
}

pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<actor::IndexStats>, ApiError> {
    Ok(Json(state.index.stats().await?))
}
