//! Axum HTTP surface over [`Service`].
//!
//! ## URL layout
//!
//! ```text
//! GET  /api/health
//! POST /api/query
//! POST /api/ingest
//! GET  /api/graph/entities?limit
//! GET  /api/graph/neighbors/{entity}?max_hops
//! GET  /api/graph/subgraph/{entity}?max_hops&node_limit&edge_limit
//! ```
//!
//! Shutdown is driven by a [`CancellationToken`] wired to axum's graceful
//! shutdown.

mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::service::Service;

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<Service>,
    /// Deadline around a whole query request.
    pub request_timeout: Duration,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health",                    get(api::health))
        .route("/api/query",                     post(api::query))
        .route("/api/ingest",                    post(api::ingest))
        .route("/api/graph/entities",            get(api::entities))
        .route("/api/graph/neighbors/{entity}",  get(api::neighbors))
        .route("/api/graph/subgraph/{entity}",   get(api::subgraph))
        .with_state(state)
}

/// Bind `bind_addr` and serve until `shutdown` is cancelled.
pub async fn serve(state: ApiState, bind_addr: &str, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(state);
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("http server shut down");
    Ok(())
}
