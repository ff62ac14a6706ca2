//! Request/response correlation over the duplex channel.
//!
//! Server-initiated requests register a waiter keyed by server PID. An
//! inbound frame carrying `reply_to_pid` resolves the waiter exactly once;
//! duplicates and unknown PIDs are ignored. Teardown cancels every pending
//! waiter at once.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use trellis_proto::Frame;

/// Table of pending PID waiters for one session.
#[derive(Debug, Default)]
pub struct PidTable {
    inner: Mutex<HashMap<u64, oneshot::Sender<Frame>>>,
}

impl PidTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `pid`. The returned receiver resolves with the
    /// reply frame, or errors when the waiter is cancelled.
    ///
    /// PIDs come from a monotonic counter, so a pid is never re-registered
    /// while still pending.
    pub fn register(&self, pid: u64) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(pid, tx);
        rx
    }

    /// Resolve the waiter for `pid` with `frame`.
    ///
    /// Returns `true` if a waiter was pending. A second resolution for the
    /// same pid finds no waiter and returns `false`.
    pub fn resolve(&self, pid: u64, frame: Frame) -> bool {
        let Some(tx) = self.inner.lock().remove(&pid) else {
            return false;
        };
        // The receiver may have timed out and dropped; that is not an error.
        let _ = tx.send(frame);
        true
    }

    /// Remove a waiter without resolving it (request timeout path).
    pub fn cancel(&self, pid: u64) -> bool {
        self.inner.lock().remove(&pid).is_some()
    }

    /// Drop every pending waiter. Receivers observe a closed channel, which
    /// callers surface as *session-closed*.
    pub fn cancel_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.len();
        inner.clear();
        count
    }

    /// Number of pending waiters.
    pub fn pending(&self) -> usize {
        self.inner.lock().len()
    }
}
