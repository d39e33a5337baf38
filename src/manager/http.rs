//! HTTP API of the manager
//!
//! | Method/Path      | Purpose                                   |
//! |------------------|-------------------------------------------|
//! | `POST /register` | worker heartbeat; address from the socket |
//! | `GET /workers`   | registry snapshot                         |
//! | `GET /proxies`   | current elected proxies                   |
//! | `POST /dispatch` | forward a task to a proxy, with retries   |
//! | `GET /health`    | liveness                                  |
//!
//! Request bodies above `max_body_bytes` are rejected with 413.

use crate::common::{request_tracing_middleware, Clock, Error};
use crate::manager::dispatch::Dispatcher;
use crate::manager::election::ProxySet;
use crate::manager::failure::FailureTracker;
use crate::manager::registry::{Registry, WorkerMetadata};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ManagerState {
    pub registry: Arc<Registry>,
    pub proxies: Arc<ProxySet>,
    pub failures: Arc<FailureTracker>,
    pub dispatcher: Arc<Dispatcher>,
    pub clock: Clock,
}

/// Build the router. Must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router(state: ManagerState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/workers", get(list_workers))
        .route("/proxies", get(list_proxies))
        .route("/dispatch", post(dispatch))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_tracing_middleware))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// The worker's address is the connection's remote IP, never the body.
/// The body is parsed as a JSON object whatever its `Content-Type`.
async fn register(
    State(state): State<ManagerState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> impl IntoResponse {
    let info: WorkerMetadata = match serde_json::from_slice(&body) {
        Ok(info) => info,
        Err(e) => {
            let err = Error::InvalidRequest(format!("registration metadata: {}", e));
            return (err.to_http_status(), Json(err.to_json()));
        }
    };

    let ip = remote.ip().to_canonical().to_string();
    let now = state.registry.register(ip.clone(), info, state.clock.now());
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "ip": ip, "now": now })),
    )
}

async fn list_workers(State(state): State<ManagerState>) -> impl IntoResponse {
    Json(state.registry.list())
}

async fn list_proxies(State(state): State<ManagerState>) -> impl IntoResponse {
    Json(json!({ "proxies": state.proxies.addresses() }))
}

async fn dispatch(
    State(state): State<ManagerState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match state.dispatcher.dispatch(&payload).await {
        Ok(outcome) => (StatusCode::OK, Json(json!(outcome))),
        Err(e) => {
            tracing::warn!("Dispatch rejected: {}", e);
            (e.to_http_status(), Json(e.to_json()))
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
