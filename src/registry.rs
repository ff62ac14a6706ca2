//! Session registry: the authoritative map from user id to live session.
//!
//! The only shared mutable structure across sessions. Enforces
//! at-most-one-session-per-user by displacing the prior session inside the
//! map entry's critical section: the loser is signalled to close with
//! *displaced* before the new session is installed, so lookups never observe
//! two sessions for one user.
//!
//! Broadcast fan-out snapshots the target handles before any send, so no map
//! lock is held across I/O.

use crate::metrics;
use crate::session::{EnqueueError, Session};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use trellis_proto::{CloseReason, Frame};

/// Targeted-send failure, reported per recipient.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// No live session for that user.
    #[error("not connected")]
    NotConnected,
    /// The recipient's outbound queue was saturated; the session was closed
    /// as a slow consumer.
    #[error("outbound queue full")]
    QueueFull,
}

/// Result of registering a session.
#[derive(Debug)]
pub struct RegisterOutcome {
    /// The session this registration evicted, already signalled to close.
    pub displaced: Option<Arc<Session>>,
}

impl RegisterOutcome {
    /// Whether this registration took the user from offline to online.
    ///
    /// Displacing reconnects keep the user online throughout, so presence
    /// publishes an online transition only when this is true.
    pub fn fresh_online(&self) -> bool {
        self.displaced.is_none()
    }
}

/// Process-wide index of live sessions keyed by user id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<i64, Arc<Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, displacing any prior session for the same user.
    pub fn register(&self, session: Arc<Session>) -> RegisterOutcome {
        let user_id = session.user.user_id;
        let displaced = match self.sessions.entry(user_id) {
            Entry::Occupied(mut occupied) => {
                // Signal the loser inside the entry lock, then swap: no
                // window where the user has zero or two sessions.
                occupied.get().close(CloseReason::Displaced);
                let old = occupied.insert(session);
                metrics::SESSIONS_DISPLACED.inc();
                info!(user_id, old_session = %old.session_id, "Session displaced by newer connection");
                Some(old)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(session);
                metrics::SESSIONS_ONLINE.inc();
                None
            }
        };
        RegisterOutcome { displaced }
    }

    /// Remove a session, but only if the slot still holds this exact
    /// session. Returns whether the user went offline (always, given
    /// at-most-one, unless the session was already displaced).
    pub fn unregister(&self, session: &Arc<Session>) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.user.user_id, |_, current| {
                current.session_id == session.session_id
            })
            .is_some();
        if removed {
            metrics::SESSIONS_ONLINE.dec();
            debug!(user_id = session.user.user_id, "Session unregistered");
        }
        removed
    }

    /// Resolve a user's live session.
    pub fn lookup(&self, user_id: i64) -> Option<Arc<Session>> {
        self.sessions.get(&user_id).map(|s| s.value().clone())
    }

    /// Whether a user has a live session.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// Enqueue a frame on a user's outbound queue.
    ///
    /// A saturated queue closes the recipient's session with
    /// *protocol-error* (slow consumer) and reports `QueueFull`.
    pub fn send_to_user(&self, user_id: i64, frame: Frame) -> Result<(), SendError> {
        let Some(session) = self.lookup(user_id) else {
            return Err(SendError::NotConnected);
        };
        match session.enqueue(frame) {
            Ok(()) => Ok(()),
            Err(EnqueueError::Full) => {
                metrics::QUEUE_OVERFLOWS.inc();
                session.close(CloseReason::ProtocolError);
                Err(SendError::QueueFull)
            }
            Err(EnqueueError::Closed) => Err(SendError::NotConnected),
        }
    }

    /// Best-effort fan-out to many users. Snapshots the target set first so
    /// no shard lock is held while enqueuing; per-recipient failures are
    /// collected, never aborting the rest.
    pub fn broadcast_to_users(&self, user_ids: &[i64], frame: &Frame) -> HashMap<i64, SendError> {
        let targets: Vec<(i64, Arc<Session>)> = user_ids
            .iter()
            .filter_map(|id| self.lookup(*id).map(|s| (*id, s)))
            .collect();

        let mut errors = HashMap::new();
        for id in user_ids {
            if !targets.iter().any(|(t, _)| t == id) {
                errors.insert(*id, SendError::NotConnected);
            }
        }
        for (id, session) in targets {
            match session.enqueue(frame.clone()) {
                Ok(()) => {}
                Err(EnqueueError::Full) => {
                    metrics::QUEUE_OVERFLOWS.inc();
                    session.close(CloseReason::ProtocolError);
                    errors.insert(id, SendError::QueueFull);
                }
                Err(EnqueueError::Closed) => {
                    errors.insert(id, SendError::NotConnected);
                }
            }
        }
        errors
    }

    /// Close a user's session with *auth-revoked*. Called by the platform's
    /// auth side when a bearer token is invalidated mid-session.
    pub fn revoke(&self, user_id: i64) -> bool {
        match self.lookup(user_id) {
            Some(session) => {
                session.close(CloseReason::AuthRevoked);
                true
            }
            None => false,
        }
    }

    /// Close every session (shutdown path). Sessions observe their close
    /// token and tear down; the map is cleared here so late lookups miss.
    pub fn drain(&self, reason: CloseReason) -> usize {
        let handles: Vec<Arc<Session>> = self.sessions.iter().map(|e| e.value().clone()).collect();
        let count = handles.len();
        for session in handles {
            session.close(reason);
        }
        self.sessions.clear();
        metrics::SESSIONS_ONLINE.set(0);
        count
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
