//! HTTP server implementation using axum.

use crate::error::ServerError;
use crate::server::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod handlers;

/// Create HTTP router with all endpoints.
///
/// Each route answers other methods with a JSON 405.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/set",
            post(handlers::handle_set).fallback(handlers::method_not_allowed),
        )
        .route(
            "/get",
            get(handlers::handle_get).fallback(handlers::method_not_allowed),
        )
        .route(
            "/count",
            get(handlers::handle_count).fallback(handlers::method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve HTTP on `listener` until `drain` resolves, then finish in-flight
/// requests and return.
///
/// # Errors
///
/// Returns `ServerError` if the server encounters a runtime error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    drain: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {addr}");
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(drain)
        .await
        .map_err(|e| ServerError::Http(e.to_string()))?;

    tracing::info!("HTTP server drained");
    Ok(())
}
