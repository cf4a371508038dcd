//! Axum handlers for `/api/*` routes.

use std::path::PathBuf;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::ApiState;
use crate::error::AppError;
use crate::graph::{GraphError, GraphStore, clamp_entity_limit};
use crate::ingest::IngestError;
use crate::service::QueryMode;

const MAX_TOP_K: i64 = 20;

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct QueryRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    top_k: Option<i64>,
}

#[derive(Deserialize, Default)]
pub(super) struct IngestRequest {
    #[serde(default)]
    data_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
pub(super) struct EntitiesParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub(super) struct NeighborsParams {
    max_hops: Option<i64>,
}

#[derive(Deserialize)]
pub(super) struct SubgraphParams {
    max_hops: Option<i64>,
    node_limit: Option<i64>,
    edge_limit: Option<i64>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn graph_or_503(state: &ApiState) -> Result<&GraphStore, Response> {
    state.service.graph().ok_or_else(|| {
        (StatusCode::SERVICE_UNAVAILABLE, json_error("graph_unavailable", "graph store is not configured"))
            .into_response()
    })
}

fn graph_error_response(e: GraphError) -> Response {
    warn!(error = %e, "graph request failed");
    match e {
        GraphError::Unavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, json_error("graph_unavailable", e)).into_response()
        }
        _ => (StatusCode::BAD_GATEWAY, json_error("graph_error", e)).into_response(),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<ApiState>) -> Response {
    (StatusCode::OK, Json(state.service.health().await)).into_response()
}

/// POST /api/query
pub(super) async fn query(State(state): State<ApiState>, Json(req): Json<QueryRequest>) -> Response {
    if req.question.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, json_error("invalid_request", "question must not be empty"))
            .into_response();
    }
    let top_k = req.top_k.unwrap_or(5);
    if !(1..=MAX_TOP_K).contains(&top_k) {
        return (
            StatusCode::BAD_REQUEST,
            json_error("invalid_request", format!("top_k must be between 1 and {MAX_TOP_K}")),
        )
            .into_response();
    }
    let mode = QueryMode::parse(req.mode.as_deref().unwrap_or("rag"));

    let call = state.service.answer(&req.question, mode, top_k as usize);
    match tokio::time::timeout(state.request_timeout, call).await {
        Ok(Ok(answer)) => (StatusCode::OK, Json(answer)).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "query failed");
            (StatusCode::BAD_GATEWAY, json_error("upstream", e)).into_response()
        }
        Err(_) => (StatusCode::GATEWAY_TIMEOUT, json_error("timeout", "query timed out")).into_response(),
    }
}

/// POST /api/ingest
///
/// The body is optional; an empty body ingests the configured directory.
pub(super) async fn ingest(State(state): State<ApiState>, body: Bytes) -> Response {
    let req: IngestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        IngestRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => return (StatusCode::BAD_REQUEST, json_error("invalid_request", e)).into_response(),
        }
    };
    match state.service.ingest(req.data_dir.as_deref()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "documents": report.documents,
                "chunks": report.chunks,
                "entities": report.entities,
                "relationships": report.relationships,
                "rejected": report.rejected,
                "graph": report.graph,
            })),
        )
            .into_response(),
        Err(AppError::Ingest(e @ IngestError::MissingDirectory(_))) => {
            (StatusCode::BAD_REQUEST, json_error("invalid_request", e)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "ingestion failed");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response()
        }
    }
}

/// GET /api/graph/entities
pub(super) async fn entities(State(state): State<ApiState>, Query(p): Query<EntitiesParams>) -> Response {
    let graph = match graph_or_503(&state) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    let limit = clamp_entity_limit(p.limit.unwrap_or(100));
    match graph.list_entities(limit).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => graph_error_response(e),
    }
}

/// GET /api/graph/neighbors/{entity}: 404 when nothing is connected.
pub(super) async fn neighbors(
    State(state): State<ApiState>,
    Path(entity): Path<String>,
    Query(p): Query<NeighborsParams>,
) -> Response {
    let graph = match graph_or_503(&state) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    match graph.neighbors(&entity, p.max_hops.unwrap_or(2)).await {
        Ok(list) if list.is_empty() => {
            (StatusCode::NOT_FOUND, json_error("not_found", format!("Entity '{entity}' not found")))
                .into_response()
        }
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => graph_error_response(e),
    }
}

/// GET /api/graph/subgraph/{entity}
pub(super) async fn subgraph(
    State(state): State<ApiState>,
    Path(entity): Path<String>,
    Query(p): Query<SubgraphParams>,
) -> Response {
    let graph = match graph_or_503(&state) {
        Ok(g) => g,
        Err(resp) => return resp,
    };
    let result = graph
        .subgraph(
            &entity,
            p.max_hops.unwrap_or(2),
            p.node_limit.unwrap_or(200),
            p.edge_limit.unwrap_or(400),
        )
        .await;
    match result {
        Ok(sub) if sub.is_not_found() => {
            (StatusCode::NOT_FOUND, json_error("not_found", format!("Entity '{entity}' not found")))
                .into_response()
        }
        Ok(sub) => (StatusCode::OK, Json(sub)).into_response(),
        Err(e) => graph_error_response(e),
    }
}
