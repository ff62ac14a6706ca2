//! Notification inbox frame handlers.

use super::decode;
use crate::error::{HandlerError, HandlerResult};
use crate::router::{Context, FrameHandler};
use async_trait::async_trait;
use serde_json::{Value, json};
use trellis_proto::{GetNotifications, MarkNotificationRead, MarkedRead, MessageType};

/// `get_notifications`: newest-first inbox page.
pub struct GetNotificationsHandler;

#[async_trait]
impl FrameHandler for GetNotificationsHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let query: GetNotifications = decode(payload)?;
        let default_limit = ctx.hub.config.limits.notification_page;
        let notifications = ctx
            .hub
            .notifications
            .list(ctx.user_id(), query, default_limit)
            .await?;
        let value = serde_json::to_value(&notifications)
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(
            MessageType::GetNotifications,
            json!({ "notifications": value }),
        )))
    }
}

/// `mark_notification_read`: owner-enforced, monotonic.
pub struct MarkNotificationReadHandler;

#[async_trait]
impl FrameHandler for MarkNotificationReadHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult {
        let request: MarkNotificationRead = decode(payload)?;
        let updated = ctx
            .hub
            .notifications
            .mark_read(ctx.user_id(), request.notification_id)
            .await?;
        let value = serde_json::to_value(MarkedRead { updated })
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(MessageType::MarkNotificationRead, value)))
    }
}

/// `mark_all_read`: flush the whole inbox.
pub struct MarkAllReadHandler;

#[async_trait]
impl FrameHandler for MarkAllReadHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: Value) -> HandlerResult {
        let updated = ctx.hub.notifications.mark_all_read(ctx.user_id()).await?;
        let value = serde_json::to_value(MarkedRead { updated })
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        Ok(Some(ctx.reply(MessageType::MarkAllRead, value)))
    }
}
