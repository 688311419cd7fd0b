//! HTTP API
//!
//! - [`health`] - liveness and agent identity
//! - [`print`] - direct printing that bypasses the queue
//! - [`jobs`] - queued print jobs
//! - [`printers`] - printer configuration and discovery

pub mod health;
pub mod jobs;
pub mod print;
pub mod printers;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{AppError, AppResponse, AppResult};

/// HTTP request log line
async fn log_request(
    request: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());
    response
}

/// Routes without state
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(print::router())
        .merge(jobs::router())
        .merge(printers::router())
}

/// Complete application router
pub fn build_router(state: ServerState) -> Router {
    build_app().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(middleware::from_fn(log_request)),
    )
}
