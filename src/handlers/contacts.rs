//! Contact lifecycle frame handlers.

use super::decode;
use crate::error::HandlerResult;
use crate::router::{Context, FrameHandler};
use async_trait::async_trait;
use serde_json::{Value, json};
use trellis_proto::{FriendRequest, FriendRequestResponse, MessageType};

/// `friend_request`: open a pending contact and notify the recipient.
pub struct FriendRequestHandler;

#[async_trait]
impl FrameHandler for FriendRequestHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: FriendRequest = decode(payload)?;
        let row = ctx
            .hub
            .contacts
            .request(&ctx.session.user, request.to_user_id)
            .await?;
        Ok(Some(ctx.reply(
            MessageType::FriendRequest,
            json!({ "contactId": row.id, "status": row.status }),
        )))
    }
}

/// `friend_request_response`: accept or reject through the notification.
pub struct FriendRequestResponseHandler;

#[async_trait]
impl FrameHandler for FriendRequestResponseHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: FriendRequestResponse = decode(payload)?;
        let outcome = ctx
            .hub
            .contacts
            .respond(&ctx.session.user, request.notification_id, request.accept)
            .await?;
        Ok(Some(ctx.reply(
            MessageType::FriendRequestResponse,
            json!({ "status": outcome.status.as_str(), "chatId": outcome.chat_id }),
        )))
    }
}
