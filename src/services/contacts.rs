//! Contact service: the request/accept/reject/cancel state machine, and
//! chat-id provisioning on accept.
//!
//! ```text
//! (none) --request--> pending --accept--> accepted
//!                        |--reject--> rejected
//!                        |--cancel--> cancelled
//! ```
//!
//! All transitions are authoritative on the Contact row and idempotent:
//! repeating an accept on an already-accepted row is a no-op success.

use super::notify::{CreateEvent, EventType, NotificationService};
use super::now_ms;
use crate::db::{ContactRow, ContactStatus, Database, DbError};
use crate::error::HandlerError;
use crate::session::UserSnapshot;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use trellis_proto::EventMetadata;
use uuid::Uuid;

/// Result of answering a contact request.
#[derive(Debug, Clone)]
pub struct RespondOutcome {
    /// The resulting contact status.
    pub status: ContactStatus,
    /// Chat id, present exactly when the contact is accepted.
    pub chat_id: Option<String>,
}

/// Contact relationship lifecycle.
pub struct ContactService {
    db: Database,
    notifications: Arc<NotificationService>,
}

impl ContactService {
    /// Create the contact service.
    pub fn new(db: Database, notifications: Arc<NotificationService>) -> Self {
        Self { db, notifications }
    }

    /// Open a contact request from `requester` to `to_user_id`.
    ///
    /// Creates the pending row, then a `friend_request` notification for the
    /// recipient (action required), live-pushed if they are online.
    #[instrument(skip(self, requester), fields(requester_id = requester.user_id, to_user_id))]
    pub async fn request(
        &self,
        requester: &UserSnapshot,
        to_user_id: i64,
    ) -> Result<ContactRow, HandlerError> {
        if to_user_id == requester.user_id {
            return Err(HandlerError::Conflict(
                "cannot request contact with yourself".to_string(),
            ));
        }
        if !self.db.users().exists(to_user_id).await? {
            return Err(HandlerError::NotFound(format!("user {to_user_id}")));
        }
        if self
            .db
            .contacts()
            .find_pair(requester.user_id, to_user_id)
            .await?
            .is_some()
        {
            return Err(HandlerError::Conflict(
                "a contact row already exists for this pair".to_string(),
            ));
        }

        let row = self
            .db
            .contacts()
            .create_pending(requester.user_id, to_user_id, now_ms())
            .await
            .map_err(|e| match &e {
                // Losing the race to a concurrent request is a duplicate.
                DbError::Sqlx(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    HandlerError::Conflict("a contact row already exists for this pair".to_string())
                }
                _ => HandlerError::Db(e),
            })?;

        info!(contact_id = row.id, "Contact request created");

        self.notifications
            .create(CreateEvent {
                event_type: EventType::FriendRequest,
                title: "New contact request".to_string(),
                description: format!("{} wants to connect with you", requester.username),
                owner_id: to_user_id,
                other_user_id: Some(requester.user_id),
                project_id: None,
                status: None,
                action_required: true,
                metadata: EventMetadata {
                    requester_id: Some(requester.user_id),
                    contact_id: Some(row.id),
                    ..Default::default()
                },
            })
            .await?;

        Ok(row)
    }

    /// Answer a pending request through its notification.
    ///
    /// The caller must own the notification, which makes them the request's
    /// recipient. Accept provisions a fresh chat id; either outcome notifies
    /// the requester with a `request_response` event.
    #[instrument(skip(self, responder), fields(responder_id = responder.user_id, notification_id, accept))]
    pub async fn respond(
        &self,
        responder: &UserSnapshot,
        notification_id: i64,
        accept: bool,
    ) -> Result<RespondOutcome, HandlerError> {
        let Some(event) = self.db.events().get(notification_id).await? else {
            return Err(HandlerError::NotFound(format!(
                "notification {notification_id}"
            )));
        };
        // Ownership gate: a foreign notification id behaves as absent.
        if event.owner_id != responder.user_id || event.event_type != "friend_request" {
            return Err(HandlerError::NotFound(format!(
                "notification {notification_id}"
            )));
        }

        let metadata: EventMetadata = event
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        let Some(contact_id) = metadata.contact_id else {
            return Err(HandlerError::Internal(
                "friend_request event has no contact reference".to_string(),
            ));
        };

        let Some(contact) = self.db.contacts().find_by_id(contact_id).await? else {
            return Err(HandlerError::NotFound(format!("contact {contact_id}")));
        };
        if contact.requester_id == responder.user_id || !contact.has_participant(responder.user_id)
        {
            return Err(HandlerError::Conflict(
                "only the recipient may answer a contact request".to_string(),
            ));
        }

        let desired = if accept {
            ContactStatus::Accepted
        } else {
            ContactStatus::Rejected
        };

        match contact.contact_status() {
            // Repeats of a settled outcome are no-op successes.
            Some(current) if current == desired => {
                return Ok(RespondOutcome {
                    status: current,
                    chat_id: contact.chat_id,
                });
            }
            Some(ContactStatus::Pending) => {}
            _ => {
                return Err(HandlerError::Conflict(format!(
                    "contact request already {}",
                    contact.status
                )));
            }
        }

        let now = now_ms();
        let chat_id = accept.then(|| Uuid::new_v4().to_string());
        let transitioned = self
            .db
            .contacts()
            .transition(contact.id, ContactStatus::Pending, desired, chat_id.as_deref(), now)
            .await?;
        if transitioned == 0 {
            // Lost a race; the row settled elsewhere.
            return Err(HandlerError::Conflict(
                "contact request was resolved concurrently".to_string(),
            ));
        }

        if let Err(e) = self
            .db
            .events()
            .resolve_action(responder.user_id, event.id, desired.as_str(), now)
            .await
        {
            warn!(event_id = event.id, error = %e, "Failed to resolve request notification");
        }

        info!(contact_id = contact.id, status = desired.as_str(), "Contact request answered");

        let description = if accept {
            format!("{} accepted your contact request", responder.username)
        } else {
            format!("{} declined your contact request", responder.username)
        };
        self.notifications
            .create(CreateEvent {
                event_type: EventType::RequestResponse,
                title: "Contact request answered".to_string(),
                description,
                owner_id: contact.requester_id,
                other_user_id: Some(responder.user_id),
                project_id: None,
                status: Some(desired.as_str()),
                action_required: false,
                metadata: EventMetadata {
                    contact_id: Some(contact.id),
                    ..Default::default()
                },
            })
            .await?;

        Ok(RespondOutcome {
            status: desired,
            chat_id,
        })
    }

    /// Withdraw a pending request. Only the requester may cancel; terminal.
    ///
    /// The recipient's actionable notification is resolved so their inbox
    /// stops asking for a decision.
    pub async fn cancel(
        &self,
        requester_id: i64,
        contact_id: i64,
    ) -> Result<(), HandlerError> {
        let Some(contact) = self.db.contacts().find_by_id(contact_id).await? else {
            return Err(HandlerError::NotFound(format!("contact {contact_id}")));
        };
        if contact.requester_id != requester_id {
            return Err(HandlerError::Conflict(
                "only the requester may cancel a contact request".to_string(),
            ));
        }
        match contact.contact_status() {
            Some(ContactStatus::Cancelled) => return Ok(()),
            Some(ContactStatus::Pending) => {}
            _ => {
                return Err(HandlerError::Conflict(format!(
                    "contact request already {}",
                    contact.status
                )));
            }
        }

        let now = now_ms();
        self.db
            .contacts()
            .transition(contact.id, ContactStatus::Pending, ContactStatus::Cancelled, None, now)
            .await?;

        let recipient = contact.other_of(requester_id);
        if let Ok(Some(event)) = self.db.events().open_request_for_contact(contact.id).await {
            if let Err(e) = self
                .db
                .events()
                .resolve_action(recipient, event.id, ContactStatus::Cancelled.as_str(), now)
                .await
            {
                warn!(event_id = event.id, error = %e, "Failed to resolve cancelled request notification");
            }
        }

        info!(contact_id = contact.id, "Contact request cancelled");
        Ok(())
    }
}
