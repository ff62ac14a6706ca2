//! Core configuration struct definitions.

use super::session::{LimitsConfig, SessionConfig};
use serde::Deserialize;

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server identity and listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session-loop tuning.
    #[serde(default)]
    pub session: SessionConfig,
    /// Output and tolerance limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output.
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Server identity and listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket gateway binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: LogFormat::default(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or `:memory:` for tests.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:9050".to_string()
}

fn default_db_path() -> String {
    "trellis.db".to_string()
}
