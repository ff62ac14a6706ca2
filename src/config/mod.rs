//! Configuration loading and management.
//!
//! Split into logical submodules:
//! - [`types`]: core config structs (Config, ServerConfig, DatabaseConfig)
//! - [`session`]: session-loop tuning (queues, heartbeat, limits)

mod session;
mod types;

pub use session::{LimitsConfig, SessionConfig};
pub use types::{Config, DatabaseConfig, LogFormat, ServerConfig};

use std::path::Path;

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(Path::new(path))?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }
}

/// Validate a loaded configuration, collecting every problem at once.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.server.listen.is_empty() {
        errors.push("server.listen must not be empty".to_string());
    }
    if config.session.outbound_queue == 0 {
        errors.push("session.outbound_queue must be at least 1".to_string());
    }
    if config.session.heartbeat_interval_secs == 0 {
        errors.push("session.heartbeat_interval_secs must be at least 1".to_string());
    }
    if config.session.heartbeat_grace_secs < config.session.heartbeat_interval_secs {
        errors.push(
            "session.heartbeat_grace_secs must be >= session.heartbeat_interval_secs".to_string(),
        );
    }
    if config.limits.history_page == 0 || config.limits.history_page_max == 0 {
        errors.push("limits.history_page and limits.history_page_max must be at least 1".to_string());
    }
    if config.limits.history_page > config.limits.history_page_max {
        errors.push("limits.history_page must be <= limits.history_page_max".to_string());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
