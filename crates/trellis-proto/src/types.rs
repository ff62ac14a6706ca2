//! Message-type vocabulary and session close reasons.

use std::fmt;

/// The closed set of frame types understood by the hub.
///
/// The wire carries these as snake_case strings in the frame's `type` field.
/// Unrecognized strings are rejected at dispatch with a typed error frame;
/// they never become a `MessageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// C→S: persist and deliver a chat message.
    SendChatMessage,
    /// S→C: live delivery of a chat message.
    NewChatMessage,
    /// C→S request: paginated chat history (keyset, newest first).
    GetChatHistory,
    /// C→S request: conversations with last message and unread count.
    GetChatList,
    /// C→S: monotonic status transition to *read*.
    MarkMessagesRead,
    /// S→C: a contact came online or went offline.
    PresenceEvent,
    /// S→C: durable notification live-push.
    NewNotification,
    /// C→S request: notification inbox page.
    GetNotifications,
    /// C→S: mark one notification read.
    MarkNotificationRead,
    /// C→S: mark the whole inbox read.
    MarkAllRead,
    /// C→S: open a contact request.
    FriendRequest,
    /// C→S: accept or reject a pending contact request.
    FriendRequestResponse,
    /// C→S request: generic read dispatched into the read-only collaborators.
    DataRequest,
    /// Transient typing indicator, relayed to the chat peer.
    Typing,
    /// Heartbeat probe (either direction).
    Ping,
    /// Heartbeat answer (either direction).
    Pong,
    /// S→C: typed error frame.
    Error,
}

impl MessageType {
    /// Wire name of this frame type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendChatMessage => "send_chat_message",
            Self::NewChatMessage => "new_chat_message",
            Self::GetChatHistory => "get_chat_history",
            Self::GetChatList => "get_chat_list",
            Self::MarkMessagesRead => "mark_messages_read",
            Self::PresenceEvent => "presence_event",
            Self::NewNotification => "new_notification",
            Self::GetNotifications => "get_notifications",
            Self::MarkNotificationRead => "mark_notification_read",
            Self::MarkAllRead => "mark_all_read",
            Self::FriendRequest => "friend_request",
            Self::FriendRequestResponse => "friend_request_response",
            Self::DataRequest => "data_request",
            Self::Typing => "typing",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    /// Parse a wire name. Returns `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "send_chat_message" => Self::SendChatMessage,
            "new_chat_message" => Self::NewChatMessage,
            "get_chat_history" => Self::GetChatHistory,
            "get_chat_list" => Self::GetChatList,
            "mark_messages_read" => Self::MarkMessagesRead,
            "presence_event" => Self::PresenceEvent,
            "new_notification" => Self::NewNotification,
            "get_notifications" => Self::GetNotifications,
            "mark_notification_read" => Self::MarkNotificationRead,
            "mark_all_read" => Self::MarkAllRead,
            "friend_request" => Self::FriendRequest,
            "friend_request_response" => Self::FriendRequestResponse,
            "data_request" => Self::DataRequest,
            "typing" => Self::Typing,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "error" => Self::Error,
            _ => return None,
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason carried in the close frame when the server ends a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer session for the same user authenticated and evicted this one.
    Displaced,
    /// No pong within the heartbeat grace window.
    HeartbeatTimeout,
    /// The bearer token stopped being valid mid-session.
    AuthRevoked,
    /// Orderly close: the client went away or the server is shutting down.
    ClientClosed,
    /// Malformed traffic past the tolerance threshold, or a slow consumer.
    ProtocolError,
}

impl CloseReason {
    /// Wire form of the reason, as carried in the close frame.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Displaced => "displaced",
            Self::HeartbeatTimeout => "heartbeat-timeout",
            Self::AuthRevoked => "auth-revoked",
            Self::ClientClosed => "client-closed",
            Self::ProtocolError => "protocol-error",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        let all = [
            MessageType::SendChatMessage,
            MessageType::NewChatMessage,
            MessageType::GetChatHistory,
            MessageType::GetChatList,
            MessageType::MarkMessagesRead,
            MessageType::PresenceEvent,
            MessageType::NewNotification,
            MessageType::GetNotifications,
            MessageType::MarkNotificationRead,
            MessageType::MarkAllRead,
            MessageType::FriendRequest,
            MessageType::FriendRequestResponse,
            MessageType::DataRequest,
            MessageType::Typing,
            MessageType::Ping,
            MessageType::Pong,
            MessageType::Error,
        ];
        for t in all {
            assert_eq!(MessageType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn unknown_type_rejected() {
        assert_eq!(MessageType::parse("group_chat_message"), None);
        assert_eq!(MessageType::parse(""), None);
        assert_eq!(MessageType::parse("SEND_CHAT_MESSAGE"), None);
    }

    #[test]
    fn close_reasons() {
        assert_eq!(CloseReason::Displaced.as_str(), "displaced");
        assert_eq!(CloseReason::HeartbeatTimeout.as_str(), "heartbeat-timeout");
        assert_eq!(CloseReason::ProtocolError.to_string(), "protocol-error");
    }
}
