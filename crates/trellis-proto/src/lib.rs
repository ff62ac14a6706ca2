//! # trellis-proto
//!
//! Frame schema and message vocabulary for the Trellis realtime protocol.
//!
//! Every frame on the wire is a single JSON object:
//!
//! ```json
//! { "pid": 12, "reply_to_pid": 4, "type": "send_chat_message",
//!   "from_user_id": 7, "payload": { "chatId": "c-xyz", "text": "hello" },
//!   "error": { "code": "not_contacts", "message": "..." } }
//! ```
//!
//! `pid` is assigned by the sender from its own monotonic counter; client and
//! server counters are disjoint namespaces. `reply_to_pid` echoes the peer's
//! pid when the frame answers a request.
//!
//! This crate is runtime-free: serde types only, no tokio. The server and
//! test clients both build frames through it.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod frame;
mod payload;
mod types;

pub use frame::{Frame, FrameDecodeError, FrameError};
pub use payload::{
    ChatListEntry, ChatMessagePayload, ChatHistoryPage, ChatListPage, DataRequest,
    EventMetadata, FriendRequest, FriendRequestResponse, GetChatHistory, GetChatList,
    GetNotifications, LastMessage, MarkAllRead, MarkMessagesRead, MarkNotificationRead,
    MarkedRead, NotificationPayload, PresenceEvent, PresenceKind, ProfileBrief,
    SendChatMessage, SentAck, Typing,
};
pub use types::{CloseReason, MessageType};
