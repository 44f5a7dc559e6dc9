//! # Relay
//!
//! A real-time broadcast relay: every message a connected peer sends over its
//! WebSocket is delivered to every connected peer.
//!
//! ## Features
//!
//! - **Single authority**: one hub loop owns membership and fan-out, no locks
//! - **Isolation**: each peer has its own bounded queue and pump tasks
//! - **Backpressure by eviction**: a peer that cannot keep up is dropped
//!   instead of stalling everyone else
//!
//! ## Modules
//!
//! - [`websocket`]: Hub, connection pumps and the transport boundary
//! - [`api`]: HTTP server with Axum (page, static files, `/ws`, health)
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay::api::{serve, AppState};
//! use relay::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     let state = AppState::with_hub_config(config.server.clone(), config.hub.clone());
//!     serve(state, &config.server).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod websocket;

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};

pub use websocket::{
    websocket_handler, Connection, ConnectionId, HubConfig, HubError, HubHandle, Notification,
    Payload,
};
