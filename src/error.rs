//! Unified error handling for trellisd.
//!
//! Centralized error hierarchy for the realtime hub, with automatic
//! conversions, error-frame generation, and metric labeling.

use crate::db::DbError;
use thiserror::Error;
use trellis_proto::Frame;

/// Errors that can occur while handling an inbound frame.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("bad payload: {0}")]
    BadPayload(String),

    #[error("message has no text and no media")]
    EmptyMessage,

    #[error("no accepted contact covers this conversation")]
    NotContacts,

    #[error("recipient is not connected")]
    NotConnected,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("outbound queue saturated")]
    QueueOverflow,

    #[error("request timed out")]
    Timeout,

    #[error("session closed")]
    SessionClosed,

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Stable error code: metric label and the `code` field of error frames.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownType(_) => "unknown_type",
            Self::BadPayload(_) => "bad_payload",
            Self::EmptyMessage => "empty_message",
            Self::NotContacts => "not_contacts",
            Self::NotConnected => "not_connected",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::QueueOverflow => "queue_overflow",
            Self::Timeout => "timeout",
            Self::SessionClosed => "session_closed",
            Self::Db(_) => "persistence_failure",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this error counts against the session's protocol-error budget.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::BadPayload(_))
    }

    /// Convert to a typed error frame correlated to the offending request.
    ///
    /// Internal detail is not leaked to clients; the stable code plus a terse
    /// message is the whole surface.
    pub fn to_error_frame(&self, reply_to_pid: Option<u64>) -> Frame {
        let message = match self {
            Self::Db(_) => "persistence failed".to_string(),
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        Frame::error(self.error_code(), message, reply_to_pid)
    }
}

/// Result type for frame handlers. `Ok(Some(frame))` is sent as the reply.
pub type HandlerResult = Result<Option<Frame>, HandlerError>;
