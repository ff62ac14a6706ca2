//! The unified per-session event loop.
//!
//! Each session runs one task with four `tokio::select!` arms:
//!
//! 1. **Reader** - deframes inbound websocket text, resolves PID waiters,
//!    and dispatches the rest through the router (inbound stays FIFO).
//! 2. **Writer** - drains the bounded outbound queue; the loop is the sole
//!    consumer, so outbound delivery is FIFO per recipient.
//! 3. **Heartbeat** - pings idle clients; silence past the grace window
//!    tears the session down with `heartbeat-timeout`.
//! 4. **Close token** - observes external closes (displacement, registry
//!    drain, slow-consumer eviction).
//!
//! Teardown runs exactly once, in a fixed order: the registry removes the
//! entry first, then the session is signalled to close (cancelling pending
//! waiters), then the presence service runs. A session is therefore never
//! both closed and registered, so a reconnect racing an in-flight unwind is
//! an ordinary displacement of a live session.

use super::handle::{EnqueueError, Session, UserSnapshot};
use crate::hub::Hub;
use crate::metrics;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use trellis_proto::{CloseReason, Frame};

const HEARTBEAT_CHECK_SECS: u64 = 5;

/// What a select arm decided.
enum SelectResult {
    /// Nothing to do, continue the loop.
    None,
    /// Write these frames, then continue.
    Continue { pending_writes: Vec<Frame> },
    /// Write these frames, then tear down with the reason.
    Break {
        pending_writes: Vec<Frame>,
        reason: CloseReason,
    },
    /// Dispatch an inbound frame through the router.
    Dispatch(Box<Frame>),
    /// Send a heartbeat ping.
    SendPing,
}

/// Create a session, install it in the registry (displacing any prior
/// session for the user), and publish the online transition when this took
/// the user from offline to online.
///
/// Displacing reconnects keep the user online throughout; contacts get one
/// online event per offline->online transition, never a duplicate.
pub async fn attach(hub: &Arc<Hub>, user: UserSnapshot) -> (Arc<Session>, mpsc::Receiver<Frame>) {
    let (session, outbound_rx) = Session::new(user, hub.config.session.outbound_queue);
    let outcome = hub.registry.register(session.clone());
    if outcome.fresh_online() {
        hub.presence.connected(&session.user).await;
    }
    (session, outbound_rx)
}

/// Unwind a session: remove it from the registry (identity-guarded), then
/// signal the close, then publish the offline transition when the user
/// actually went offline.
///
/// The registry entry goes first so no closed session ever occupies a slot;
/// a displaced session unwinds as a no-op. `reason` is used only when the
/// session was not already closing for its own reason (displacement, drain,
/// revocation, slow-consumer eviction).
pub async fn detach(hub: &Arc<Hub>, session: &Arc<Session>, reason: CloseReason) -> CloseReason {
    let went_offline = hub.registry.unregister(session);

    let reason = session.close_reason().unwrap_or(reason);
    session.close(reason);

    if went_offline {
        hub.presence.disconnected(&session.user).await;
    }
    reason
}

/// Serve one authenticated websocket until it closes.
///
/// Owns the whole session lifecycle: registry install (with displacement),
/// presence online, the event loop, and the reverse unwind.
#[instrument(skip(hub, user, socket), fields(user_id = user.user_id, username = %user.username))]
pub async fn run_session(hub: Arc<Hub>, user: UserSnapshot, socket: WebSocket) {
    let (session, outbound_rx) = attach(&hub, user).await;
    info!(session_id = %session.session_id, "Session connected");

    let (loop_reason, mut ws_tx) = run_event_loop(&hub, &session, outbound_rx, socket).await;

    // Unregister before signalling close, and only then tell the peer why.
    let reason = detach(&hub, &session, loop_reason).await;
    let close = WsMessage::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: reason.as_str().into(),
    }));
    let _ = ws_tx.send(close).await;
    info!(session_id = %session.session_id, reason = %reason, "Session closed");
}

async fn run_event_loop(
    hub: &Arc<Hub>,
    session: &Arc<Session>,
    mut outbound_rx: mpsc::Receiver<Frame>,
    socket: WebSocket,
) -> (CloseReason, SplitSink<WebSocket, WsMessage>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let ping_after = Duration::from_secs(hub.config.session.heartbeat_interval_secs);
    let grace = Duration::from_secs(hub.config.session.heartbeat_grace_secs);
    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_CHECK_SECS));
    // First tick fires immediately, we don't want that
    heartbeat.tick().await;
    let mut ping_pending = false;

    let reason = loop {
        let select_result = tokio::select! {
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(message)) => {
                        ping_pending = false;
                        process_ws_message(hub, session, message)
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Transport read error");
                        SelectResult::Break { pending_writes: vec![], reason: CloseReason::ClientClosed }
                    }
                    None => SelectResult::Break { pending_writes: vec![], reason: CloseReason::ClientClosed },
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(frame) => SelectResult::Continue { pending_writes: vec![frame] },
                    // Queue sender side gone: session handle dropped everywhere.
                    None => SelectResult::Break { pending_writes: vec![], reason: CloseReason::ClientClosed },
                }
            }

            _ = heartbeat.tick() => {
                let idle = session.idle();
                if idle >= grace {
                    warn!(idle_secs = idle.as_secs(), "Heartbeat timeout");
                    SelectResult::Break { pending_writes: vec![], reason: CloseReason::HeartbeatTimeout }
                } else if idle >= ping_after && !ping_pending {
                    SelectResult::SendPing
                } else {
                    SelectResult::None
                }
            }

            _ = session.close_token().cancelled() => {
                let reason = session.close_reason().unwrap_or(CloseReason::ClientClosed);
                SelectResult::Break { pending_writes: vec![], reason }
            }
        };

        match select_result {
            SelectResult::None => continue,

            SelectResult::Continue { pending_writes } => {
                if write_frames(&mut ws_tx, pending_writes).await.is_err() {
                    break CloseReason::ClientClosed;
                }
            }

            SelectResult::Break {
                pending_writes,
                reason,
            } => {
                let _ = write_frames(&mut ws_tx, pending_writes).await;
                break reason;
            }

            SelectResult::SendPing => {
                let ping = Frame::push(trellis_proto::MessageType::Ping, serde_json::Value::Null);
                if write_frames(&mut ws_tx, vec![ping]).await.is_err() {
                    break CloseReason::ClientClosed;
                }
                ping_pending = true;
            }

            SelectResult::Dispatch(frame) => {
                let reply = hub.router.dispatch(hub, session, *frame).await;
                if let Some(reply) = reply {
                    // Replies go through the outbound queue so they stay
                    // ordered with concurrent pushes from other sessions.
                    match session.enqueue(reply) {
                        Ok(()) => {}
                        Err(EnqueueError::Full) => {
                            metrics::QUEUE_OVERFLOWS.inc();
                            break CloseReason::ProtocolError;
                        }
                        Err(EnqueueError::Closed) => {
                            let reason =
                                session.close_reason().unwrap_or(CloseReason::ClientClosed);
                            break reason;
                        }
                    }
                }
                // The router may have exhausted the protocol-error budget.
                if session.is_closed() {
                    let reason = session.close_reason().unwrap_or(CloseReason::ProtocolError);
                    break reason;
                }
            }
        }
    };

    (reason, ws_tx)
}

/// Classify one inbound websocket message.
fn process_ws_message(
    hub: &Arc<Hub>,
    session: &Arc<Session>,
    message: WsMessage,
) -> SelectResult {
    session.touch();
    match message {
        WsMessage::Text(text) => process_text(hub, session, &text),
        // Protocol-level ping/pong only feeds the activity clock.
        WsMessage::Ping(_) | WsMessage::Pong(_) => SelectResult::None,
        WsMessage::Close(_) => SelectResult::Break {
            pending_writes: vec![],
            reason: CloseReason::ClientClosed,
        },
        WsMessage::Binary(_) => protocol_violation(hub, session, "binary frames are not accepted"),
    }
}

fn process_text(hub: &Arc<Hub>, session: &Arc<Session>, text: &str) -> SelectResult {
    let frame = match Frame::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Malformed frame");
            return protocol_violation(hub, session, "malformed frame");
        }
    };

    // Correlation first: a frame answering one of our PIDs resolves its
    // waiter and is consumed; duplicates and unknown PIDs fall through to
    // nothing (never to dispatch).
    if let Some(reply_to) = frame.reply_to_pid {
        if !session.resolve_reply(reply_to, frame) {
            debug!(reply_to, "Reply for unknown or already-resolved pid ignored");
        }
        return SelectResult::None;
    }

    SelectResult::Dispatch(Box::new(frame))
}

/// Typed error frame for a transport-level violation, closing the session
/// once the budget is exhausted.
fn protocol_violation(hub: &Arc<Hub>, session: &Arc<Session>, detail: &str) -> SelectResult {
    let violations = session.note_protocol_error();
    metrics::record_frame_error("transport", "bad_frame");
    let error = Frame::error("protocol_error", detail, None);
    if violations >= hub.config.limits.max_protocol_errors {
        warn!(violations, "Protocol error budget exhausted");
        SelectResult::Break {
            pending_writes: vec![error],
            reason: CloseReason::ProtocolError,
        }
    } else {
        SelectResult::Continue {
            pending_writes: vec![error],
        }
    }
}

async fn write_frames(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    frames: Vec<Frame>,
) -> Result<(), axum::Error> {
    for frame in frames {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound frame");
                continue;
            }
        };
        ws_tx.send(WsMessage::Text(text)).await?;
        metrics::FRAMES_OUT.inc();
    }
    Ok(())
}
