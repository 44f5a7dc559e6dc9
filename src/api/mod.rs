//! Relay HTTP API
//!
//! HTTP layer for the relay, built with Axum.
//!
//! # Endpoints
//!
//! ## Pages
//! - `GET /` - Chat page rendered from `<static_dir>/index.html`
//! - `GET /static/*` - Files from the static directory
//!
//! ## WebSocket
//! - `GET /ws` - Broadcast relay connection
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use relay::api::{serve, AppState};
//! use relay::config::ServerConfig;
//! use relay::websocket::HubConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let state = AppState::with_hub_config(config.clone(), HubConfig::default());
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::websocket::websocket_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let static_files = ServeDir::new(&state.config.static_dir);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(routes::index::index))
        .route("/ws", get(websocket_handler))
        .nest_service("/static", static_files)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the HTTP server
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Relay listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Relay shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
