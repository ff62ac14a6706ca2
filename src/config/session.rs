//! Session-loop tuning and limits configuration.

use serde::Deserialize;

/// Per-session queue and heartbeat configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Outbound queue capacity per session (default: 64).
    ///
    /// Backpressure policy is *disconnect*: a session whose outbound queue is
    /// full when a publisher enqueues is closed with `protocol-error` rather
    /// than buffering unboundedly behind a slow consumer.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Idle seconds before the server sends a ping (default: 30).
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which the session is torn down with
    /// `heartbeat-timeout` (default: 75).
    #[serde(default = "default_heartbeat_grace")]
    pub heartbeat_grace_secs: u64,
    /// Timeout for server-initiated request/response correlation (default: 10).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_grace_secs: default_heartbeat_grace(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Result-set and tolerance limits.
///
/// These limits prevent pathologically large result sets from exhausting
/// server resources or causing slow clients to back up.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Default chat-history page size (default: 30).
    #[serde(default = "default_history_page")]
    pub history_page: u32,
    /// Maximum chat-history page size a client may request (default: 100).
    #[serde(default = "default_history_page_max")]
    pub history_page_max: u32,
    /// Default notification page size (default: 50).
    #[serde(default = "default_notification_page")]
    pub notification_page: u32,
    /// Malformed frames tolerated before the session closes with
    /// `protocol-error` (default: 8).
    #[serde(default = "default_max_protocol_errors")]
    pub max_protocol_errors: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            history_page: default_history_page(),
            history_page_max: default_history_page_max(),
            notification_page: default_notification_page(),
            max_protocol_errors: default_max_protocol_errors(),
        }
    }
}

fn default_outbound_queue() -> usize {
    64
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_heartbeat_grace() -> u64 {
    75
}

fn default_request_timeout() -> u64 {
    10
}

fn default_history_page() -> u32 {
    30
}

fn default_history_page_max() -> u32 {
    100
}

fn default_notification_page() -> u32 {
    50
}

fn default_max_protocol_errors() -> u32 {
    8
}
