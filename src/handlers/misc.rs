//! Transient and collaborator frame handlers.

use super::decode;
use crate::error::{HandlerError, HandlerResult};
use crate::registry::SendError;
use crate::router::{Context, FrameHandler};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use trellis_proto::{DataRequest, Frame, MessageType, Typing};

/// `typing`: relay the indicator to the chat peer when online.
/// Never persisted; a missing peer is not an error.
pub struct TypingHandler;

#[async_trait]
impl FrameHandler for TypingHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let typing: Typing = decode(payload)?;
        let peer = match ctx.hub.chat.peer_of(ctx.user_id(), &typing.chat_id).await {
            Ok(peer) => peer,
            // Unknown or foreign chats are ignored, never answered.
            Err(HandlerError::NotContacts) => return Ok(None),
            Err(e) => return Err(e),
        };

        let value =
            serde_json::to_value(&typing).map_err(|e| HandlerError::Internal(e.to_string()))?;
        let frame = Frame::push(MessageType::Typing, value).from_user(ctx.user_id());
        match ctx.hub.registry.send_to_user(peer, frame) {
            Ok(()) | Err(SendError::NotConnected) => {}
            Err(SendError::QueueFull) => {
                debug!(peer, "Typing relay dropped on saturated queue");
            }
        }
        Ok(None)
    }
}

/// `ping`: answer with a pong correlated to the client's pid.
pub struct PingHandler;

#[async_trait]
impl FrameHandler for PingHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: Value) -> HandlerResult {
        Ok(Some(ctx.reply(MessageType::Pong, Value::Null)))
    }
}

/// `pong`: nothing beyond the activity bookkeeping the session loop already
/// did on receipt.
pub struct PongHandler;

#[async_trait]
impl FrameHandler for PongHandler {
    async fn handle(&self, _ctx: &Context<'_>, _payload: Value) -> HandlerResult {
        Ok(None)
    }
}

/// `data_request`: dispatch a read into the registered collaborators;
/// the result passes through unchanged.
pub struct DataRequestHandler;

#[async_trait]
impl FrameHandler for DataRequestHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: DataRequest = decode(payload)?;
        let result = ctx
            .hub
            .data
            .dispatch(&request.resource, ctx.user_id(), &request.params)
            .await?;
        Ok(Some(ctx.reply(MessageType::DataRequest, result)))
    }
}
