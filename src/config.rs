//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `index.html` and other static assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply a `host:port` listen address.
    ///
    /// A bare `:port` keeps the configured host.
    pub fn set_addr(&mut self, addr: &str) -> Result<(), ConfigError> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidAddr(addr.to_string()))?;
        self.port = port
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(addr.to_string()))?;
        if !host.is_empty() {
            self.host = host.to_string();
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("relay").join("config.toml")),
            Some(PathBuf::from("/etc/relay/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = var("RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("RELAY_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = var("RELAY_STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }

        // Hub overrides
        if let Some(capacity) = var("RELAY_OUTBOUND_CAPACITY").and_then(|c| c.parse().ok()) {
            self.hub.outbound_capacity = capacity;
        }
        if let Some(echo) = var("RELAY_ECHO_TO_SENDER") {
            self.hub.echo_to_sender = echo.to_lowercase() != "false" && echo != "0";
        }

        // Logging overrides
        if let Some(level) = var("RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid listen address: {0} (expected host:port)")]
    InvalidAddr(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Relay Configuration
#
# Environment variables override these settings:
# - RELAY_HOST
# - RELAY_PORT
# - RELAY_STATIC_DIR
# - RELAY_OUTBOUND_CAPACITY
# - RELAY_ECHO_TO_SENDER
# - RELAY_LOG_LEVEL
# - RELAY_LOG_FORMAT

[server]
# Listen host
host = "0.0.0.0"

# Listen port
port = 8080

# Directory holding index.html and static assets
static_dir = "./static"

[hub]
# Messages buffered per peer before it is considered unresponsive and evicted
outbound_capacity = 256

# Messages buffered between all readers and the hub loop
intake_capacity = 64

# Deliver a message back to the peer that sent it
echo_to_sender = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
