//! Chat service: one-to-one message persistence, live delivery, history
//! pagination, read receipts, and the chat list.
//!
//! The durability contract: a message is persisted before any delivery, so a
//! client that observes an id can rely on it being in the store. The chat id
//! is never derived from user ids; it is always the one on the accepted
//! Contact row.

use super::{ms_to_utc, now_ms};
use crate::config::LimitsConfig;
use crate::db::{ContactRow, ContactStatus, Database, MessageRow, NewMessage, STATUS_SENT};
use crate::error::HandlerError;
use crate::metrics;
use crate::registry::{SendError, SessionRegistry};
use crate::session::UserSnapshot;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use trellis_proto::{
    ChatHistoryPage, ChatListEntry, ChatMessagePayload, Frame, GetChatHistory, LastMessage,
    MessageType, ProfileBrief, SendChatMessage, SentAck,
};
use uuid::Uuid;

const TYPE_TEXT: i32 = 1;
const TYPE_MEDIA: i32 = 2;

/// One-to-one chat operations.
pub struct ChatService {
    db: Database,
    registry: Arc<SessionRegistry>,
    limits: LimitsConfig,
}

impl ChatService {
    /// Create the chat service.
    pub fn new(db: Database, registry: Arc<SessionRegistry>, limits: LimitsConfig) -> Self {
        Self {
            db,
            registry,
            limits,
        }
    }

    /// Resolve the conversation a sender is addressing.
    ///
    /// Accepts either an explicit chat id or a peer user id; both resolve
    /// through the Contact row and require status accepted plus sender
    /// membership.
    async fn resolve_contact(
        &self,
        sender_id: i64,
        request: &SendChatMessage,
    ) -> Result<ContactRow, HandlerError> {
        let row = if let Some(chat_id) = &request.chat_id {
            self.db.contacts().find_by_chat_id(chat_id).await?
        } else if let Some(to_user_id) = request.to_user_id {
            self.db.contacts().find_pair(sender_id, to_user_id).await?
        } else {
            return Err(HandlerError::BadPayload(
                "chatId or toUserId required".to_string(),
            ));
        };

        match row {
            Some(row)
                if row.contact_status() == Some(ContactStatus::Accepted)
                    && row.has_participant(sender_id) =>
            {
                Ok(row)
            }
            _ => Err(HandlerError::NotContacts),
        }
    }

    /// Persist a message, then deliver it live if the recipient is online.
    ///
    /// Returns the ack for the sender. Live delivery failure is not an
    /// error: the recipient reads the message from history on next connect.
    #[instrument(skip(self, request), fields(sender_id = sender.user_id))]
    pub async fn send_message(
        &self,
        sender: &UserSnapshot,
        request: SendChatMessage,
    ) -> Result<SentAck, HandlerError> {
        let text = request.text.as_deref().unwrap_or("").trim();
        if text.is_empty() && request.media_id.is_none() {
            return Err(HandlerError::EmptyMessage);
        }

        let contact = self.resolve_contact(sender.user_id, &request).await?;
        let chat_id = contact
            .chat_id
            .clone()
            .ok_or(HandlerError::NotContacts)?;
        let recipient_id = contact.other_of(sender.user_id);

        let id = Uuid::new_v4().to_string();
        let sent_at_ms = now_ms();
        let type_id = if request.media_id.is_some() { TYPE_MEDIA } else { TYPE_TEXT };

        // Durability before delivery.
        self.db
            .messages()
            .insert(NewMessage {
                id: &id,
                chat_id: &chat_id,
                sender_id: sender.user_id,
                body: text,
                media_id: request.media_id.as_deref(),
                reply_to: request.reply_to.as_deref(),
                sent_at_ms,
                type_id,
            })
            .await?;
        metrics::MESSAGES_PERSISTED.inc();

        let payload = ChatMessagePayload {
            id: id.clone(),
            chat_id: chat_id.clone(),
            sender_id: sender.user_id,
            text: text.to_string(),
            media_id: request.media_id.clone(),
            reply_to: request.reply_to.clone(),
            sent_at: ms_to_utc(sent_at_ms),
            status: STATUS_SENT,
            type_id,
        };

        if self.registry.is_online(recipient_id) {
            let frame = match serde_json::to_value(&payload) {
                Ok(v) => Frame::push(MessageType::NewChatMessage, v).from_user(sender.user_id),
                Err(e) => return Err(HandlerError::Internal(e.to_string())),
            };
            match self.registry.send_to_user(recipient_id, frame) {
                Ok(()) => {}
                Err(SendError::NotConnected | SendError::QueueFull) => {
                    debug!(recipient_id, message_id = %id, "Live delivery skipped");
                }
            }
        }

        Ok(SentAck {
            id,
            chat_id,
            sent_at: ms_to_utc(sent_at_ms),
        })
    }

    /// One newest-first history page under the composite keyset order.
    pub async fn history(
        &self,
        requester_id: i64,
        request: GetChatHistory,
    ) -> Result<ChatHistoryPage, HandlerError> {
        self.require_membership(requester_id, &request.chat_id).await?;

        let limit = request
            .limit
            .unwrap_or(self.limits.history_page)
            .min(self.limits.history_page_max)
            .max(1);

        let rows = self
            .db
            .messages()
            .page(&request.chat_id, request.before_message_id.as_deref(), limit)
            .await?;

        Ok(ChatHistoryPage {
            chat_id: request.chat_id,
            messages: rows.into_iter().map(row_to_payload).collect(),
        })
    }

    /// Transition the peer's messages in this chat to *read*. Idempotent.
    pub async fn mark_read(&self, reader_id: i64, chat_id: &str) -> Result<u64, HandlerError> {
        self.require_membership(reader_id, chat_id).await?;
        let updated = self.db.messages().mark_read(chat_id, reader_id).await?;
        Ok(updated)
    }

    /// The chat list: every accepted contact with profile snapshot, last
    /// message, unread count, and the live online flag stamped from the
    /// registry at response time.
    pub async fn chat_list(&self, requester_id: i64) -> Result<Vec<ChatListEntry>, HandlerError> {
        let contacts = self.db.contacts().accepted_contacts(requester_id).await?;
        let mut entries = Vec::with_capacity(contacts.len());

        for contact in contacts {
            let Some(chat_id) = contact.chat_id.clone() else {
                // accepted without a chat id would violate the contact
                // invariant; skip rather than fabricate one
                warn!(contact_id = contact.id, "Accepted contact without chat id");
                continue;
            };
            let other_id = contact.other_of(requester_id);

            let Some(profile) = self.db.users().get_user_base_info(other_id).await? else {
                warn!(user_id = other_id, "Contact references missing user");
                continue;
            };

            let last = self.db.messages().last_message(&chat_id).await?;
            let unread = self.db.messages().unread_count(&chat_id, requester_id).await?;

            entries.push(ChatListEntry {
                chat_id,
                user: ProfileBrief {
                    user_id: profile.id,
                    username: profile.username,
                    first_name: profile.first_name,
                    last_name: profile.last_name,
                    picture: profile.picture,
                },
                online: self.registry.is_online(other_id),
                last_message: last.map(|m| LastMessage {
                    text: m.body,
                    sender_id: m.sender_id,
                    sent_at: ms_to_utc(m.sent_at_ms),
                }),
                unread_count: unread,
            });
        }

        Ok(entries)
    }

    /// The peer of `user_id` in `chat_id`, for typing relay.
    pub async fn peer_of(&self, user_id: i64, chat_id: &str) -> Result<i64, HandlerError> {
        let contact = self.require_membership(user_id, chat_id).await?;
        Ok(contact.other_of(user_id))
    }

    async fn require_membership(
        &self,
        user_id: i64,
        chat_id: &str,
    ) -> Result<ContactRow, HandlerError> {
        match self.db.contacts().find_by_chat_id(chat_id).await? {
            Some(row)
                if row.contact_status() == Some(ContactStatus::Accepted)
                    && row.has_participant(user_id) =>
            {
                Ok(row)
            }
            _ => Err(HandlerError::NotContacts),
        }
    }
}

fn row_to_payload(row: MessageRow) -> ChatMessagePayload {
    ChatMessagePayload {
        id: row.id,
        chat_id: row.chat_id,
        sender_id: row.sender_id,
        text: row.body,
        media_id: row.media_id,
        reply_to: row.reply_to,
        sent_at: ms_to_utc(row.sent_at_ms),
        status: row.status,
        type_id: row.type_id,
    }
}
