//! Frame handlers, one module per message family.

mod chat;
mod contacts;
mod misc;
mod notifications;

pub use chat::{
    GetChatHistoryHandler, GetChatListHandler, MarkMessagesReadHandler, SendChatMessageHandler,
};
pub use contacts::{FriendRequestHandler, FriendRequestResponseHandler};
pub use misc::{DataRequestHandler, PingHandler, PongHandler, TypingHandler};
pub use notifications::{GetNotificationsHandler, MarkAllReadHandler, MarkNotificationReadHandler};

use crate::error::HandlerError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode a payload into its per-type struct.
///
/// The frame envelope is schema-less at the payload level; this is the one
/// place the dynamic value becomes a typed one.
pub fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload).map_err(|e| HandlerError::BadPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_proto::SendChatMessage;

    #[test]
    fn decode_surfaces_shape_errors() {
        let bad = serde_json::json!({"chatId": 42});
        let err = decode::<SendChatMessage>(bad).unwrap_err();
        assert_eq!(err.error_code(), "bad_payload");
    }

    #[test]
    fn decode_accepts_valid_payload() {
        let ok = serde_json::json!({"chatId": "c-1", "text": "hi"});
        let msg: SendChatMessage = decode(ok).unwrap();
        assert_eq!(msg.chat_id.as_deref(), Some("c-1"));
    }
}
