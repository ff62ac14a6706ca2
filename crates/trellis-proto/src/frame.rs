//! The JSON frame envelope.

use crate::types::MessageType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum FrameDecodeError {
    /// The text was not a JSON object of the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The `type` field named something outside the closed vocabulary.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
}

/// Error body attached to `error` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameError {
    /// Stable snake_case code, suitable for client branching and metrics.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// A single frame on the duplex channel.
///
/// Serialization skips absent optional fields so the wire stays close to the
/// documented schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Sender-assigned monotonic id, present when the sender wants a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u64>,
    /// Echo of the peer's `pid` when this frame is a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_pid: Option<u64>,
    /// Wire name of the frame type. Kept as a string so unknown inbound
    /// types can be answered with a typed error instead of a decode failure.
    #[serde(rename = "type")]
    pub kind: String,
    /// Originating user, stamped by the server on routed frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user_id: Option<i64>,
    /// Type-specific body. The router performs the only dynamic decode.
    #[serde(default)]
    pub payload: Value,
    /// Present on `error` frames only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FrameError>,
}

impl Frame {
    /// Build a server push (no reply expected).
    pub fn push(kind: MessageType, payload: Value) -> Self {
        Self {
            pid: None,
            reply_to_pid: None,
            kind: kind.as_str().to_string(),
            from_user_id: None,
            payload,
            error: None,
        }
    }

    /// Build a request that expects a reply correlated by `pid`.
    pub fn request(kind: MessageType, pid: u64, payload: Value) -> Self {
        Self {
            pid: Some(pid),
            ..Self::push(kind, payload)
        }
    }

    /// Build a reply to the peer's request `pid`.
    pub fn reply(kind: MessageType, reply_to_pid: u64, payload: Value) -> Self {
        Self {
            reply_to_pid: Some(reply_to_pid),
            ..Self::push(kind, payload)
        }
    }

    /// Build a typed error frame, optionally correlated to a request.
    pub fn error(code: &str, message: impl Into<String>, reply_to_pid: Option<u64>) -> Self {
        Self {
            pid: None,
            reply_to_pid,
            kind: MessageType::Error.as_str().to_string(),
            from_user_id: None,
            payload: Value::Null,
            error: Some(FrameError {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    /// Stamp the originating user onto a routed frame.
    pub fn from_user(mut self, user_id: i64) -> Self {
        self.from_user_id = Some(user_id);
        self
    }

    /// Resolve the frame type against the closed vocabulary.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.kind)
    }

    /// Decode a frame from wire text.
    pub fn decode(text: &str) -> Result<Self, FrameDecodeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode the frame to wire text.
    ///
    /// Frames are built from serde types, so encoding cannot fail in
    /// practice; the signature keeps the error visible for the transport.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_minimal_frame() {
        let f = Frame::decode(r#"{"type":"ping","payload":{}}"#).unwrap();
        assert_eq!(f.message_type(), Some(MessageType::Ping));
        assert_eq!(f.pid, None);
        assert_eq!(f.reply_to_pid, None);
    }

    #[test]
    fn decode_request_with_pid() {
        let f = Frame::decode(
            r#"{"pid":7,"type":"get_chat_history","payload":{"chatId":"c-1","limit":30}}"#,
        )
        .unwrap();
        assert_eq!(f.pid, Some(7));
        assert_eq!(f.message_type(), Some(MessageType::GetChatHistory));
        assert_eq!(f.payload["chatId"], "c-1");
    }

    #[test]
    fn unknown_type_survives_decode() {
        // The envelope decodes; type resolution is the router's job.
        let f = Frame::decode(r#"{"type":"group_broadcast","payload":{}}"#).unwrap();
        assert_eq!(f.message_type(), None);
        assert_eq!(f.kind, "group_broadcast");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Frame::decode("{not json").is_err());
        assert!(Frame::decode(r#"["array"]"#).is_err());
    }

    #[test]
    fn error_frame_shape() {
        let f = Frame::error("not_contacts", "no accepted contact", Some(4));
        let text = f.encode().unwrap();
        let back = Frame::decode(&text).unwrap();
        assert_eq!(back.message_type(), Some(MessageType::Error));
        assert_eq!(back.reply_to_pid, Some(4));
        let err = back.error.unwrap();
        assert_eq!(err.code, "not_contacts");
    }

    #[test]
    fn absent_optionals_not_serialized() {
        let text = Frame::push(MessageType::Pong, Value::Null).encode().unwrap();
        assert!(!text.contains("pid"));
        assert!(!text.contains("error"));
        assert!(!text.contains("from_user_id"));
    }

    #[test]
    fn reply_echoes_client_pid() {
        let f = Frame::reply(MessageType::GetChatList, 42, serde_json::json!({"chats": []}));
        assert_eq!(f.reply_to_pid, Some(42));
        assert_eq!(f.pid, None);
    }
}
