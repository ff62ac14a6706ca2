//! Presence service: persists online/offline transitions and fans the
//! change out to accepted contacts.

use super::{ms_to_utc, now_ms};
use crate::db::Database;
use crate::metrics;
use crate::registry::SessionRegistry;
use crate::session::UserSnapshot;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_proto::{Frame, MessageType, PresenceEvent, PresenceKind};

/// Tracks who is online and tells their contacts about it.
pub struct PresenceService {
    db: Database,
    registry: Arc<SessionRegistry>,
}

impl PresenceService {
    /// Create the presence service.
    pub fn new(db: Database, registry: Arc<SessionRegistry>) -> Self {
        Self { db, registry }
    }

    /// Handle a user coming online.
    ///
    /// The persist and the fan-out are independent: a failed upsert is
    /// logged and the fan-out still runs, and one unreachable contact never
    /// affects the others.
    pub async fn connected(&self, user: &UserSnapshot) {
        let now = now_ms();
        if let Err(e) = self.db.presence().set_online(user.user_id, now).await {
            warn!(user_id = user.user_id, error = %e, "Failed to persist online presence");
        }
        self.fan_out(user, PresenceKind::UserOnline, None).await;
    }

    /// Handle a user going offline.
    pub async fn disconnected(&self, user: &UserSnapshot) {
        let now = now_ms();
        if let Err(e) = self.db.presence().set_offline(user.user_id, now).await {
            warn!(user_id = user.user_id, error = %e, "Failed to persist offline presence");
        }
        self.fan_out(user, PresenceKind::UserOffline, Some(now)).await;
    }

    async fn fan_out(&self, user: &UserSnapshot, kind: PresenceKind, last_seen_ms: Option<i64>) {
        let contacts = match self.db.contacts().accepted_contact_ids(user.user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(user_id = user.user_id, error = %e, "Failed to load contacts for presence fan-out");
                return;
            }
        };
        if contacts.is_empty() {
            return;
        }

        let payload = PresenceEvent {
            event: kind,
            user_id: user.user_id,
            username: user.username.clone(),
            last_seen: last_seen_ms.map(ms_to_utc),
        };
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to encode presence payload");
                return;
            }
        };
        let frame = Frame::push(MessageType::PresenceEvent, payload).from_user(user.user_id);

        let errors = self.registry.broadcast_to_users(&contacts, &frame);
        let direction = match kind {
            PresenceKind::UserOnline => "online",
            PresenceKind::UserOffline => "offline",
        };
        let delivered = contacts.len() - errors.len();
        metrics::record_presence_fanout(direction, delivered);
        debug!(
            user_id = user.user_id,
            direction,
            contacts = contacts.len(),
            delivered,
            "Presence fan-out"
        );
    }
}
