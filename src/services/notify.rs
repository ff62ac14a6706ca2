//! Notification service: durable events, profile enrichment, and live push.
//!
//! Creation persists first; the live push only happens after the row exists
//! and only when the owner is online. Enrichment failures degrade the
//! payload (the profile is dropped) but never suppress the push.

use super::{ms_to_utc, now_ms};
use crate::db::{Database, EventRow, NewEvent};
use crate::error::HandlerError;
use crate::metrics;
use crate::registry::SessionRegistry;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_proto::{EventMetadata, Frame, GetNotifications, MessageType, NotificationPayload, ProfileBrief};

/// Notification event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    FriendRequest,
    RequestResponse,
    System,
    Event,
}

impl EventType {
    /// Stored form of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FriendRequest => "friend_request",
            Self::RequestResponse => "request_response",
            Self::System => "system",
            Self::Event => "event",
        }
    }
}

/// Parameters for creating a notification.
#[derive(Debug)]
pub struct CreateEvent {
    pub event_type: EventType,
    pub title: String,
    pub description: String,
    pub owner_id: i64,
    pub other_user_id: Option<i64>,
    pub project_id: Option<i64>,
    /// Lifecycle status; defaults to pending.
    pub status: Option<&'static str>,
    pub action_required: bool,
    pub metadata: EventMetadata,
}

/// Durable notifications with live push.
pub struct NotificationService {
    db: Database,
    registry: Arc<SessionRegistry>,
}

impl NotificationService {
    /// Create the notification service.
    pub fn new(db: Database, registry: Arc<SessionRegistry>) -> Self {
        Self { db, registry }
    }

    /// Persist an event, then push it live if the owner is online.
    ///
    /// Returns the durable event id. Push failures are logged and swallowed:
    /// the row is the source of truth and the owner reads it from the inbox.
    pub async fn create(&self, event: CreateEvent) -> Result<i64, HandlerError> {
        let metadata_json = if event.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&event.metadata).map_err(crate::db::DbError::Metadata)?)
        };
        let created_at_ms = now_ms();

        let id = self
            .db
            .events()
            .insert(NewEvent {
                event_type: event.event_type.as_str(),
                title: &event.title,
                description: &event.description,
                owner_id: event.owner_id,
                other_user_id: event.other_user_id,
                project_id: event.project_id,
                created_at_ms,
                status: event.status.unwrap_or("pending"),
                action_required: event.action_required,
                metadata: metadata_json.as_deref(),
            })
            .await?;

        if self.registry.is_online(event.owner_id) {
            let payload = NotificationPayload {
                id,
                event_type: event.event_type.as_str().to_string(),
                title: event.title,
                description: event.description,
                created_at: ms_to_utc(created_at_ms),
                is_read: false,
                status: event.status.unwrap_or("pending").to_string(),
                action_required: event.action_required,
                action_taken_at: None,
                other_user: match event.other_user_id {
                    Some(other) => self.enrich(other).await,
                    None => None,
                },
                project_id: event.project_id,
                metadata: event.metadata,
            };
            self.push(event.owner_id, &payload);
        }

        Ok(id)
    }

    /// Newest-first inbox page, rows transformed the same way as live push.
    pub async fn list(
        &self,
        owner_id: i64,
        query: GetNotifications,
        default_limit: u32,
    ) -> Result<Vec<NotificationPayload>, HandlerError> {
        let limit = query.limit.unwrap_or(default_limit).max(1);
        let offset = query.offset.unwrap_or(0);
        let rows = self
            .db
            .events()
            .list(owner_id, query.only_unread, limit, offset)
            .await?;

        let mut payloads = Vec::with_capacity(rows.len());
        for row in rows {
            let other_user = match row.other_user_id {
                Some(other) => self.enrich(other).await,
                None => None,
            };
            payloads.push(row_to_payload(row, other_user));
        }
        Ok(payloads)
    }

    /// Mark one notification read. Ownership enforced; non-owners affect
    /// zero rows.
    pub async fn mark_read(&self, owner_id: i64, id: i64) -> Result<u64, HandlerError> {
        Ok(self.db.events().mark_read(owner_id, id).await?)
    }

    /// Mark the owner's whole inbox read.
    pub async fn mark_all_read(&self, owner_id: i64) -> Result<u64, HandlerError> {
        Ok(self.db.events().mark_all_read(owner_id).await?)
    }

    /// Profile snapshot of the acting other user; `None` degrades the
    /// payload without failing the caller.
    async fn enrich(&self, user_id: i64) -> Option<ProfileBrief> {
        match self.db.users().get_user_base_info(user_id).await {
            Ok(Some(profile)) => Some(ProfileBrief {
                user_id: profile.id,
                username: profile.username,
                first_name: profile.first_name,
                last_name: profile.last_name,
                picture: profile.picture,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(user_id, error = %e, "Notification enrichment failed");
                None
            }
        }
    }

    fn push(&self, owner_id: i64, payload: &NotificationPayload) {
        let value = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to encode notification payload");
                return;
            }
        };
        let frame = Frame::push(MessageType::NewNotification, value);
        match self.registry.send_to_user(owner_id, frame) {
            Ok(()) => {
                metrics::NOTIFICATIONS_PUSHED.inc();
                debug!(owner_id, event_id = payload.id, "Notification pushed live");
            }
            Err(e) => {
                debug!(owner_id, event_id = payload.id, error = %e, "Notification push skipped");
            }
        }
    }
}

fn row_to_payload(row: EventRow, other_user: Option<ProfileBrief>) -> NotificationPayload {
    let metadata: EventMetadata = row
        .metadata
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();

    NotificationPayload {
        id: row.id,
        event_type: row.event_type,
        title: row.title,
        description: row.description,
        created_at: ms_to_utc(row.created_at_ms),
        is_read: row.is_read,
        status: row.status,
        action_required: row.action_required,
        action_taken_at: row.action_taken_at_ms.map(ms_to_utc),
        other_user,
        project_id: row.project_id,
        metadata,
    }
}
