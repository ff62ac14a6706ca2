//! Chat frame handlers.

use super::decode;
use crate::error::{HandlerError, HandlerResult};
use crate::router::{Context, FrameHandler};
use async_trait::async_trait;
use serde_json::Value;
use trellis_proto::{
    ChatListPage, GetChatHistory, MarkMessagesRead, MarkedRead, MessageType, SendChatMessage,
};

/// `send_chat_message`: persist + deliver, ack with the durable id.
pub struct SendChatMessageHandler;

#[async_trait]
impl FrameHandler for SendChatMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: SendChatMessage = decode(payload)?;
        let ack = ctx.hub.chat.send_message(&ctx.session.user, request).await?;
        let value = serde_json::to_value(&ack).map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(MessageType::SendChatMessage, value)))
    }
}

/// `get_chat_history`: one keyset page, newest first.
pub struct GetChatHistoryHandler;

#[async_trait]
impl FrameHandler for GetChatHistoryHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: GetChatHistory = decode(payload)?;
        let page = ctx.hub.chat.history(ctx.user_id(), request).await?;
        let value = serde_json::to_value(&page).map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(MessageType::GetChatHistory, value)))
    }
}

/// `get_chat_list`: conversations with last message and unread count.
pub struct GetChatListHandler;

#[async_trait]
impl FrameHandler for GetChatListHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: Value) -> HandlerResult {
        let chats = ctx.hub.chat.chat_list(ctx.user_id()).await?;
        let page = ChatListPage { chats };
        let value = serde_json::to_value(&page).map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(MessageType::GetChatList, value)))
    }
}

/// `mark_messages_read`: monotonic transition to *read*.
pub struct MarkMessagesReadHandler;

#[async_trait]
impl FrameHandler for MarkMessagesReadHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: MarkMessagesRead = decode(payload)?;
        let updated = ctx.hub.chat.mark_read(ctx.user_id(), &request.chat_id).await?;
        let value = serde_json::to_value(MarkedRead { updated })
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(MessageType::MarkMessagesRead, value)))
    }
}
