//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::config::ServerConfig;
use crate::websocket::{HubConfig, HubHandle};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Front door to the broadcast hub
    pub hub: HubHandle,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state around an already running hub
    pub fn new(hub: HubHandle, config: ServerConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Spawn a hub with the given configuration and wrap it
    pub fn with_hub_config(config: ServerConfig, hub_config: HubConfig) -> Self {
        Self::new(HubHandle::spawn(hub_config), config)
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
