//! Integration test common infrastructure.
//!
//! Builds a real hub over in-memory SQLite and attaches channel-backed
//! sessions, so the suite drives the same registry, router, and services
//! the websocket gateway does.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use trellis_proto::{CloseReason, Frame, MessageType};
use trellisd::config::Config;
use trellisd::db::Database;
use trellisd::hub::Hub;
use trellisd::session::{Session, UserSnapshot, attach, detach};

/// Test hub over a private on-disk SQLite database.
///
/// `:memory:` shares one cache across the whole test process, so parallel
/// tests would see each other's rows; a tempdir-backed file keeps every
/// test isolated.
pub struct TestHub {
    pub hub: Arc<Hub>,
    _data_dir: tempfile::TempDir,
}

/// One attached test session: the handle plus the outbound receiver the
/// websocket writer would drain.
pub struct TestClient {
    pub session: Arc<Session>,
    pub rx: mpsc::Receiver<Frame>,
}

impl TestHub {
    /// Build a hub with default config over a fresh in-memory database.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Build a hub with custom config.
    pub async fn with_config(config: Config) -> Self {
        let data_dir = tempfile::tempdir().expect("test data dir");
        let db_path = data_dir.path().join("test.db");
        let db = Database::new(&db_path.to_string_lossy())
            .await
            .expect("test database");
        Self {
            hub: Hub::assemble(config, db),
            _data_dir: data_dir,
        }
    }

    /// Insert a user row plus a bearer token for it.
    pub async fn seed_user(&self, user_id: i64, username: &str) {
        sqlx::query("INSERT INTO user (id, username, first_name, role_id) VALUES (?, ?, ?, 1)")
            .bind(user_id)
            .bind(username)
            .bind(format!("{username}-first"))
            .execute(self.hub.db.pool())
            .await
            .expect("seed user");
        sqlx::query("INSERT INTO auth_session (user_id, token, role_id, token_type_id) VALUES (?, ?, 1, 1)")
            .bind(user_id)
            .bind(format!("token-{user_id}"))
            .execute(self.hub.db.pool())
            .await
            .expect("seed auth session");
    }

    /// Insert an accepted contact with a fixed chat id.
    pub async fn seed_accepted_contact(&self, a: i64, b: i64, chat_id: &str) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        sqlx::query(
            r#"
            INSERT INTO contact (user_lo, user_hi, requester_id, status, chat_id,
                                 created_at_ms, updated_at_ms)
            VALUES (?, ?, ?, 'accepted', ?, 0, 0)
            "#,
        )
        .bind(lo)
        .bind(hi)
        .bind(a)
        .bind(chat_id)
        .execute(self.hub.db.pool())
        .await
        .expect("seed contact");
    }

    /// Attach a session for a seeded user, exactly as the gateway would
    /// after a successful upgrade.
    pub async fn connect(&self, user_id: i64, username: &str) -> TestClient {
        let (session, rx) = attach(
            &self.hub,
            UserSnapshot {
                user_id,
                username: username.to_string(),
                role_id: 1,
            },
        )
        .await;
        TestClient { session, rx }
    }

    /// Unwind a session, exactly as the gateway does on socket close.
    pub async fn disconnect(&self, client: &TestClient) {
        detach(&self.hub, &client.session, CloseReason::ClientClosed).await;
    }

    /// Dispatch a client frame on a session and return the reply frame.
    pub async fn request(&self, client: &TestClient, frame: Frame) -> Option<Frame> {
        self.hub
            .router
            .dispatch(&self.hub, &client.session, frame)
            .await
    }
}

impl TestClient {
    /// Receive the next pushed frame, failing after a short timeout.
    pub async fn recv(&mut self) -> Frame {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("outbound queue closed")
    }

    /// Receive the next pushed frame of a given type, skipping others.
    pub async fn recv_of(&mut self, kind: MessageType) -> Frame {
        loop {
            let frame = self.recv().await;
            if frame.message_type() == Some(kind) {
                return frame;
            }
        }
    }

    /// Assert no frame arrives within the window.
    pub async fn expect_silence(&mut self) {
        let got = tokio::time::timeout(Duration::from_millis(200), self.rx.recv()).await;
        assert!(got.is_err(), "expected no frame, got {:?}", got);
    }
}

/// Build a client frame with a pid, the way a real client would.
pub fn client_request(kind: MessageType, pid: u64, payload: serde_json::Value) -> Frame {
    Frame::request(kind, pid, payload)
}
