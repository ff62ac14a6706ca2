//! Frame router: dispatch table from message type to handler.
//!
//! The router performs the single dynamic decode step (payload JSON into the
//! per-type struct happens inside each handler via [`crate::handlers::decode`])
//! and enforces the auth context: handlers only ever see a frame attributed
//! to the session's authenticated user. Includes per-type usage counters and
//! dispatch instrumentation.

use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{
    DataRequestHandler, FriendRequestHandler, FriendRequestResponseHandler, GetChatHistoryHandler,
    GetChatListHandler, GetNotificationsHandler, MarkAllReadHandler, MarkMessagesReadHandler,
    MarkNotificationReadHandler, PingHandler, PongHandler, SendChatMessageHandler, TypingHandler,
};
use crate::hub::Hub;
use crate::metrics;
use crate::session::Session;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Instrument, Level, debug, span, warn};
use trellis_proto::{CloseReason, Frame, MessageType};

/// Context passed to every frame handler.
pub struct Context<'a> {
    /// Shared hub state (registry, services, config).
    pub hub: &'a Arc<Hub>,
    /// The session the frame arrived on; its user is the auth context.
    pub session: &'a Arc<Session>,
    /// Client PID of the inbound frame, echoed on replies.
    pub pid: Option<u64>,
}

impl Context<'_> {
    /// Build a reply frame correlated to the inbound request, when the
    /// client supplied a PID.
    pub fn reply(&self, kind: MessageType, payload: Value) -> Frame {
        match self.pid {
            Some(pid) => Frame::reply(kind, pid, payload),
            None => Frame::push(kind, payload),
        }
    }

    /// The authenticated user id of this session.
    pub fn user_id(&self) -> i64 {
        self.session.user.user_id
    }
}

/// A handler for one frame type.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Process the decoded frame. `Ok(Some(frame))` is enqueued as the reply.
    async fn handle(&self, ctx: &Context<'_>, payload: Value) -> HandlerResult;
}

/// Registry of frame handlers keyed by message type.
pub struct Router {
    handlers: HashMap<MessageType, Box<dyn FrameHandler>>,
    /// Per-type usage counters for diagnostics.
    counts: HashMap<MessageType, Arc<AtomicU64>>,
}

impl Router {
    /// Create a router with every client-to-server handler registered.
    ///
    /// Server-to-client types (`new_chat_message`, `presence_event`,
    /// `new_notification`, `error`) deliberately have no handler; a client
    /// sending one gets a typed error frame.
    pub fn new() -> Self {
        let mut handlers: HashMap<MessageType, Box<dyn FrameHandler>> = HashMap::new();

        // Chat
        handlers.insert(MessageType::SendChatMessage, Box::new(SendChatMessageHandler));
        handlers.insert(MessageType::GetChatHistory, Box::new(GetChatHistoryHandler));
        handlers.insert(MessageType::GetChatList, Box::new(GetChatListHandler));
        handlers.insert(MessageType::MarkMessagesRead, Box::new(MarkMessagesReadHandler));

        // Contacts
        handlers.insert(MessageType::FriendRequest, Box::new(FriendRequestHandler));
        handlers.insert(
            MessageType::FriendRequestResponse,
            Box::new(FriendRequestResponseHandler),
        );

        // Notification inbox
        handlers.insert(MessageType::GetNotifications, Box::new(GetNotificationsHandler));
        handlers.insert(
            MessageType::MarkNotificationRead,
            Box::new(MarkNotificationReadHandler),
        );
        handlers.insert(MessageType::MarkAllRead, Box::new(MarkAllReadHandler));

        // Collaborator reads
        handlers.insert(MessageType::DataRequest, Box::new(DataRequestHandler));

        // Transient
        handlers.insert(MessageType::Typing, Box::new(TypingHandler));
        handlers.insert(MessageType::Ping, Box::new(PingHandler));
        handlers.insert(MessageType::Pong, Box::new(PongHandler));

        let mut counts = HashMap::new();
        for &kind in handlers.keys() {
            counts.insert(kind, Arc::new(AtomicU64::new(0)));
        }

        Self { handlers, counts }
    }

    /// Per-type usage counts, most used first (diagnostics).
    pub fn usage(&self) -> Vec<(MessageType, u64)> {
        let mut stats: Vec<_> = self
            .counts
            .iter()
            .map(|(kind, count)| (*kind, count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1));
        stats
    }

    /// Dispatch one inbound frame; returns the frame to send back, if any.
    ///
    /// Handler errors become typed error frames. Protocol-class errors count
    /// against the session's tolerance budget; crossing it closes the
    /// session with `protocol-error`.
    pub async fn dispatch(
        &self,
        hub: &Arc<Hub>,
        session: &Arc<Session>,
        frame: Frame,
    ) -> Option<Frame> {
        metrics::FRAMES_IN.inc();
        let pid = frame.pid;

        let Some(kind) = frame.message_type() else {
            let err = HandlerError::UnknownType(frame.kind.clone());
            return Some(self.reject(hub, session, &frame.kind, err, pid));
        };

        let Some(handler) = self.handlers.get(&kind) else {
            let err = HandlerError::BadPayload(format!("{kind} is not a client frame"));
            return Some(self.reject(hub, session, kind.as_str(), err, pid));
        };

        if let Some(count) = self.counts.get(&kind) {
            count.fetch_add(1, Ordering::Relaxed);
        }

        let ctx = Context { hub, session, pid };
        let dispatch_span = span!(
            Level::DEBUG,
            "frame",
            frame_type = kind.as_str(),
            user_id = session.user.user_id,
            pid,
        );

        let started = Instant::now();
        let result = handler.handle(&ctx, frame.payload).instrument(dispatch_span).await;
        metrics::record_dispatch(kind.as_str(), started.elapsed().as_secs_f64());

        match result {
            Ok(reply) => reply,
            Err(e) => {
                debug!(frame_type = kind.as_str(), error = %e, "Frame handler error");
                Some(self.reject(hub, session, kind.as_str(), e, pid))
            }
        }
    }

    fn reject(
        &self,
        hub: &Arc<Hub>,
        session: &Arc<Session>,
        frame_type: &str,
        err: HandlerError,
        pid: Option<u64>,
    ) -> Frame {
        metrics::record_frame_error(frame_type, err.error_code());
        if err.is_protocol_error() {
            let violations = session.note_protocol_error();
            let budget = hub.config.limits.max_protocol_errors;
            if violations >= budget {
                warn!(
                    user_id = session.user.user_id,
                    violations, "Protocol error budget exhausted - closing session"
                );
                session.close(CloseReason::ProtocolError);
            }
        }
        err.to_error_frame(pid)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
