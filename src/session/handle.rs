//! The session handle shared between the registry, services, and the
//! session's own event loop.
//!
//! Ownership model: the registry holds a strong reference for the session's
//! lifetime; publishers (presence fan-out, chat delivery, notification push)
//! clone the `Arc` out of the registry for the duration of a send. The
//! session's event loop owns the receiving half of the outbound queue.

use super::correlation::PidTable;
use parking_lot::Mutex;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use trellis_proto::{CloseReason, Frame};
use uuid::Uuid;

/// Authenticated identity snapshot bound to a session at upgrade time.
#[derive(Debug, Clone)]
pub struct UserSnapshot {
    pub user_id: i64,
    pub username: String,
    pub role_id: i64,
}

/// Enqueue failure on a session's outbound queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The session is closing; the queue no longer accepts frames.
    #[error("session closed")]
    Closed,
    /// The bounded queue is saturated (slow consumer).
    #[error("outbound queue full")]
    Full,
}

/// Failure of a server-initiated request/response exchange.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The session tore down while the request was pending.
    #[error("session closed")]
    SessionClosed,
    /// The peer did not answer within the timeout; only this waiter was
    /// cancelled.
    #[error("request timed out")]
    Timeout,
    /// The outbound queue was saturated.
    #[error("outbound queue full")]
    QueueFull,
}

/// A live session: one authenticated user over one duplex transport.
#[derive(Debug)]
pub struct Session {
    /// Identity of this particular connection; the registry's unregister is
    /// guarded on it so a displaced session cannot evict its successor.
    pub session_id: Uuid,
    /// Authenticated user bound at upgrade time.
    pub user: UserSnapshot,
    outbound: mpsc::Sender<Frame>,
    waiters: PidTable,
    server_pid: AtomicU64,
    protocol_errors: AtomicU32,
    closed: CancellationToken,
    close_reason: OnceLock<CloseReason>,
    last_activity: Mutex<Instant>,
}

impl Session {
    /// Create a session and hand back the outbound receiver for its writer.
    pub fn new(user: UserSnapshot, outbound_capacity: usize) -> (std::sync::Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(outbound_capacity);
        let session = std::sync::Arc::new(Self {
            session_id: Uuid::new_v4(),
            user,
            outbound: tx,
            waiters: PidTable::new(),
            server_pid: AtomicU64::new(1),
            protocol_errors: AtomicU32::new(0),
            closed: CancellationToken::new(),
            close_reason: OnceLock::new(),
            last_activity: Mutex::new(Instant::now()),
        });
        (session, rx)
    }

    /// Next server PID. Server and client counters are disjoint namespaces,
    /// so no coordination with the peer is needed.
    pub fn next_pid(&self) -> u64 {
        self.server_pid.fetch_add(1, Ordering::Relaxed)
    }

    /// Enqueue a frame for the writer. Non-blocking: backpressure policy is
    /// disconnect, so a full queue is an error, not a wait.
    pub fn enqueue(&self, frame: Frame) -> Result<(), EnqueueError> {
        if self.is_closed() {
            return Err(EnqueueError::Closed);
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(EnqueueError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Send a request that expects a reply, returning the waiter's receiver.
    ///
    /// The caller awaits the receiver under its own timeout and calls
    /// [`Session::cancel_waiter`] when the timeout fires. A closed-channel
    /// receive error means the session tore down (*session-closed*).
    pub fn send_request(
        &self,
        mut frame: Frame,
    ) -> Result<(u64, oneshot::Receiver<Frame>), EnqueueError> {
        let pid = self.next_pid();
        frame.pid = Some(pid);
        let rx = self.waiters.register(pid);
        if let Err(e) = self.enqueue(frame) {
            self.waiters.cancel(pid);
            return Err(e);
        }
        Ok((pid, rx))
    }

    /// Send a request and await the peer's reply under a timeout.
    ///
    /// The timeout cancels only this waiter; teardown cancels every pending
    /// waiter, which surfaces here as [`RequestError::SessionClosed`].
    pub async fn request(
        &self,
        frame: Frame,
        timeout: std::time::Duration,
    ) -> Result<Frame, RequestError> {
        let (pid, rx) = self.send_request(frame).map_err(|e| match e {
            EnqueueError::Closed => RequestError::SessionClosed,
            EnqueueError::Full => RequestError::QueueFull,
        })?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(RequestError::SessionClosed),
            Err(_) => {
                self.cancel_waiter(pid);
                Err(RequestError::Timeout)
            }
        }
    }

    /// Resolve a pending waiter from an inbound reply frame.
    pub fn resolve_reply(&self, reply_to_pid: u64, frame: Frame) -> bool {
        self.waiters.resolve(reply_to_pid, frame)
    }

    /// Remove a waiter whose timeout fired.
    pub fn cancel_waiter(&self, pid: u64) -> bool {
        self.waiters.cancel(pid)
    }

    /// Record a protocol violation; returns the running total.
    pub fn note_protocol_error(&self) -> u32 {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Note inbound traffic for the heartbeat idle check.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Seconds since the last inbound frame.
    pub fn idle(&self) -> std::time::Duration {
        self.last_activity.lock().elapsed()
    }

    /// Begin teardown with `reason`. The first call wins and returns `true`;
    /// later calls (and later reasons) are no-ops. Cancels every pending PID
    /// waiter so service tasks blocked on replies resolve immediately.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self.close_reason.set(reason).is_ok();
        if first {
            self.closed.cancel();
            self.waiters.cancel_all();
        }
        first
    }

    /// The reason teardown started, once it has.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Whether teardown has started.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token the event loop selects on to observe external closes
    /// (displacement, registry drain, slow-consumer eviction).
    pub fn close_token(&self) -> &CancellationToken {
        &self.closed
    }

    /// Pending PID waiters (diagnostics and tests).
    pub fn pending_requests(&self) -> usize {
        self.waiters.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use trellis_proto::MessageType;

    fn test_user() -> UserSnapshot {
        UserSnapshot {
            user_id: 42,
            username: "ada".to_string(),
            role_id: 1,
        }
    }

    #[tokio::test]
    async fn enqueue_reaches_receiver() {
        let (session, mut rx) = Session::new(test_user(), 4);
        session.enqueue(Frame::push(MessageType::Ping, Value::Null)).unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.message_type(), Some(MessageType::Ping));
    }

    #[tokio::test]
    async fn full_queue_reports_overflow() {
        let (session, _rx) = Session::new(test_user(), 1);
        session.enqueue(Frame::push(MessageType::Ping, Value::Null)).unwrap();
        assert_eq!(
            session.enqueue(Frame::push(MessageType::Ping, Value::Null)),
            Err(EnqueueError::Full)
        );
    }

    #[tokio::test]
    async fn closed_session_rejects_enqueue() {
        let (session, _rx) = Session::new(test_user(), 4);
        session.close(CloseReason::ClientClosed);
        assert_eq!(
            session.enqueue(Frame::push(MessageType::Ping, Value::Null)),
            Err(EnqueueError::Closed)
        );
    }

    #[tokio::test]
    async fn close_is_idempotent_and_first_reason_wins() {
        let (session, _rx) = Session::new(test_user(), 4);
        assert!(session.close(CloseReason::Displaced));
        assert!(!session.close(CloseReason::HeartbeatTimeout));
        assert_eq!(session.close_reason(), Some(CloseReason::Displaced));
    }

    #[tokio::test]
    async fn server_pids_are_monotonic_and_distinct() {
        let (session, _rx) = Session::new(test_user(), 8);
        let a = session.next_pid();
        let b = session.next_pid();
        assert!(b > a);
    }

    #[tokio::test]
    async fn request_waiter_resolves_on_reply() {
        let (session, mut rx) = Session::new(test_user(), 4);
        let (pid, waiter) = session
            .send_request(Frame::push(MessageType::Ping, Value::Null))
            .unwrap();

        // The frame went out carrying the assigned pid.
        let sent = rx.recv().await.unwrap();
        assert_eq!(sent.pid, Some(pid));

        // Peer answers; waiter resolves exactly once.
        let reply = Frame {
            reply_to_pid: Some(pid),
            ..Frame::push(MessageType::Pong, Value::Null)
        };
        assert!(session.resolve_reply(pid, reply));
        assert!(waiter.await.is_ok());
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn close_cancels_pending_waiters() {
        let (session, _rx) = Session::new(test_user(), 4);
        let (_pid, waiter) = session
            .send_request(Frame::push(MessageType::Ping, Value::Null))
            .unwrap();
        session.close(CloseReason::ClientClosed);
        assert!(waiter.await.is_err());
    }

    #[tokio::test]
    async fn request_timeout_cancels_only_its_waiter() {
        let (session, _rx) = Session::new(test_user(), 8);
        let (_other_pid, _other) = session
            .send_request(Frame::push(MessageType::Ping, Value::Null))
            .unwrap();

        let err = session
            .request(
                Frame::push(MessageType::Ping, Value::Null),
                std::time::Duration::from_millis(20),
            )
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Timeout);
        // The unrelated waiter is still pending.
        assert_eq!(session.pending_requests(), 1);
    }

    #[tokio::test]
    async fn request_on_closed_session_fails_fast() {
        let (session, _rx) = Session::new(test_user(), 4);
        session.close(CloseReason::ClientClosed);
        let err = session
            .request(
                Frame::push(MessageType::Ping, Value::Null),
                std::time::Duration::from_millis(20),
            )
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::SessionClosed);
    }
}
