//! HTTP API of the worker
//!
//! `POST /task` runs a task. The stock worker echoes the payload back; any
//! 2xx answer counts as success for the manager.

use crate::common::request_tracing_middleware;
use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Build the router. Must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/task", post(run_task))
        .layer(middleware::from_fn(request_tracing_middleware))
}

async fn run_task(Json(payload): Json<serde_json::Value>) -> impl IntoResponse {
    tracing::info!("Received task: {}", payload);
    Json(json!({ "status": "done", "echo": payload }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn root() -> impl IntoResponse {
    Json(json!({ "status": "worker ok" }))
}
