//! Typed payload bodies for each frame type.
//!
//! The wire uses camelCase keys inside `payload`. Every struct here is the
//! single statically typed decode target for its frame type; handlers never
//! poke at raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile snapshot of a user, as embedded in chat lists and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBrief {
    /// Stable user id.
    pub user_id: i64,
    /// Login / display handle.
    pub username: String,
    /// Given name, when the profile has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name, when the profile has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Avatar URL, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// C→S `send_chat_message`.
///
/// Either `chat_id` (known conversation) or `to_user_id` (resolve through the
/// accepted contact) identifies the conversation; at least one must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessage {
    /// Conversation id, when the client already knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Peer user id, resolved server-side to the contact's chat id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<i64>,
    /// Message text. A message must carry text or media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Attached media id, when the message references an upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    /// Message id this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// A durable chat message, as pushed live and returned in history pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    /// Durable message id. Clients deduplicate optimistic echoes on this.
    pub id: String,
    /// Conversation the message belongs to.
    pub chat_id: String,
    /// Author.
    pub sender_id: i64,
    /// Message text (empty string for media-only messages).
    pub text: String,
    /// Attached media id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    /// Message id this one replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// UTC send time assigned by the server.
    pub sent_at: DateTime<Utc>,
    /// 1 sent, 2 delivered, 3 read. Monotonically non-decreasing.
    pub status: i32,
    /// 1 text, 2 media.
    pub type_id: i32,
}

/// S→C reply to `send_chat_message`: the durable id assigned to the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentAck {
    /// Durable message id.
    pub id: String,
    /// Conversation id the message was stored under.
    pub chat_id: String,
    /// UTC send time assigned by the server.
    pub sent_at: DateTime<Utc>,
}

/// C→S request `get_chat_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChatHistory {
    /// Conversation to page through.
    pub chat_id: String,
    /// Keyset anchor: return rows strictly older than this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_message_id: Option<String>,
    /// Page size; the server clamps to its configured maximum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// S→C reply to `get_chat_history`: one newest-first page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryPage {
    /// Conversation id echoed back.
    pub chat_id: String,
    /// Newest-first page of messages.
    pub messages: Vec<ChatMessagePayload>,
}

/// C→S request `get_chat_list`. Carries no parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetChatList {}

/// Last message summary inside a chat-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    /// Text of the most recent message.
    pub text: String,
    /// Author of the most recent message.
    pub sender_id: i64,
    /// UTC send time of the most recent message.
    pub sent_at: DateTime<Utc>,
}

/// One conversation in the chat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListEntry {
    /// Conversation id from the accepted contact row.
    pub chat_id: String,
    /// The other participant's profile snapshot.
    pub user: ProfileBrief,
    /// Live online flag, stamped from the session registry at response time.
    pub online: bool,
    /// Most recent message, absent for never-used conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    /// Messages from the other party not yet read.
    pub unread_count: i64,
}

/// S→C reply to `get_chat_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListPage {
    /// All conversations for the requesting user.
    pub chats: Vec<ChatListEntry>,
}

/// C→S `mark_messages_read`: read everything the peer sent in this chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkMessagesRead {
    /// Conversation to mark.
    pub chat_id: String,
}

/// S→C reply to `mark_messages_read` and `mark_notification_read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    /// Rows actually transitioned (idempotent repeats report zero).
    pub updated: u64,
}

/// Direction of a presence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    /// The contact connected.
    UserOnline,
    /// The contact disconnected.
    UserOffline,
}

/// S→C `presence_event`: a contact changed presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    /// Online or offline.
    pub event: PresenceKind,
    /// The contact the event is about.
    pub user_id: i64,
    /// The contact's username.
    pub username: String,
    /// Last-seen time, present on offline events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// The closed key set of the notification metadata bag.
///
/// Flattened into [`NotificationPayload`] so clients see one level of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    /// User who initiated a contact request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<i64>,
    /// Contact row the event refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<i64>,
    /// Community event the notification refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_event_id: Option<i64>,
    /// Reviewer in a review notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<i64>,
    /// Reviewee in a review notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewee_id: Option<i64>,
    /// Discriminator for `system` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_event_type: Option<String>,
    /// Free-form extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<Value>,
}

impl EventMetadata {
    /// True when no key is set.
    pub fn is_empty(&self) -> bool {
        self.requester_id.is_none()
            && self.contact_id.is_none()
            && self.community_event_id.is_none()
            && self.reviewer_id.is_none()
            && self.reviewee_id.is_none()
            && self.system_event_type.is_none()
            && self.additional_data.is_none()
    }
}

/// S→C `new_notification` and rows of the `get_notifications` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Durable event id.
    pub id: i64,
    /// friend_request, request_response, system, or event.
    pub event_type: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// UTC creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the owner has read it (monotonic, true is terminal).
    pub is_read: bool,
    /// pending, accepted, rejected, or cancelled.
    pub status: String,
    /// Whether the owner must act on it.
    pub action_required: bool,
    /// When the owner acted, if they have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_taken_at: Option<DateTime<Utc>>,
    /// Profile snapshot of the acting other user; omitted when enrichment
    /// failed or the event has no other user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_user: Option<ProfileBrief>,
    /// Related project, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    /// Known metadata keys, flattened into this payload.
    #[serde(flatten)]
    pub metadata: EventMetadata,
}

/// C→S request `get_notifications`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNotifications {
    /// Restrict to unread rows.
    #[serde(default)]
    pub only_unread: bool,
    /// Page size; the server clamps to its configured maximum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Page offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

/// C→S `mark_notification_read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkNotificationRead {
    /// Event to mark read. Ownership is enforced server-side.
    pub notification_id: i64,
}

/// C→S `mark_all_read`. Carries no parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkAllRead {}

/// C→S `friend_request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Recipient of the contact request.
    pub to_user_id: i64,
}

/// C→S `friend_request_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestResponse {
    /// The `friend_request` notification being answered.
    pub notification_id: i64,
    /// True accepts, false rejects.
    pub accept: bool,
}

/// C→S request `data_request`: generic read into the collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    /// Collaborator resource name (profile, feed, search, ...).
    pub resource: String,
    /// Opaque parameters, passed through to the collaborator unchanged.
    #[serde(default)]
    pub params: Value,
}

/// Transient `typing` indicator, relayed to the chat peer when online.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typing {
    /// Conversation the indicator belongs to.
    pub chat_id: String,
    /// True while composing.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}
