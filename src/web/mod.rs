//! HTTP endpoints
//!
//! Root redirect, liveness/readiness probes and Prometheus metrics, wrapped by
//! the link-preview and CORS middleware.

pub mod middleware;

use crate::metrics::BotMetrics;
use crate::shard::{ManagerState, ManagerStatus};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Target of the root redirect
pub const MARKETING_URL: &str = "https://blazium.app";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub state: ManagerState,
    pub shards: usize,
}

/// Application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub manager_status: watch::Receiver<ManagerStatus>,
    pub metrics: BotMetrics,
}

/// Create the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::embed_preview,
        ))
        .layer(axum::middleware::from_fn(middleware::cors))
        .with_state(state)
}

/// Bind the HTTP listener on all interfaces
pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    TcpListener::bind(addr).await
}

/// Root - permanent redirect to the marketing site
async fn root_handler() -> impl IntoResponse {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, MARKETING_URL)],
    )
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

/// Readiness endpoint - returns 200 while the shard manager is running
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = *state.manager_status.borrow();
    let ready = status.state.is_ready();

    let response = ReadyResponse {
        ready,
        state: status.state,
        shards: status.shards,
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}

async fn not_found_handler() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
