//! Presence fan-out: online/offline transitions reach accepted contacts
//! exactly once, with displacement suppressed.

mod common;

use common::TestHub;
use trellis_proto::MessageType;

async fn contacts_hub() -> TestHub {
    let hub = TestHub::new().await;
    hub.seed_user(7, "ada").await;
    hub.seed_user(9, "grace").await;
    hub.seed_accepted_contact(7, 9, "c-xyz").await;
    hub
}

#[tokio::test]
async fn contact_sees_exactly_one_online_event() {
    let hub = contacts_hub().await;
    let mut watcher = hub.connect(9, "grace").await;

    let _seven = hub.connect(7, "ada").await;

    let event = watcher.recv_of(MessageType::PresenceEvent).await;
    assert_eq!(event.payload["event"], "user_online");
    assert_eq!(event.payload["userId"], 7);
    assert_eq!(event.payload["username"], "ada");
    // Exactly once: nothing else follows.
    watcher.expect_silence().await;
}

#[tokio::test]
async fn displacement_does_not_duplicate_online_event() {
    let hub = contacts_hub().await;
    let mut watcher = hub.connect(9, "grace").await;

    let first = hub.connect(7, "ada").await;
    let event = watcher.recv_of(MessageType::PresenceEvent).await;
    assert_eq!(event.payload["event"], "user_online");

    // 7 reconnects while already online: the old session is displaced and
    // contacts get no second online event.
    let second = hub.connect(7, "ada").await;
    watcher.expect_silence().await;

    // The displaced session's unwind is also silent: 7 is still online.
    hub.disconnect(&first).await;
    watcher.expect_silence().await;

    // The real disconnect emits the offline event with last-seen.
    hub.disconnect(&second).await;
    let offline = watcher.recv_of(MessageType::PresenceEvent).await;
    assert_eq!(offline.payload["event"], "user_offline");
    assert_eq!(offline.payload["userId"], 7);
    assert!(offline.payload["lastSeen"].is_string());
}

#[tokio::test]
async fn reconnect_racing_self_teardown_keeps_user_online() {
    let hub = contacts_hub().await;
    let mut watcher = hub.connect(9, "grace").await;

    // 7 connects; its socket dies, but the user reconnects before the stale
    // session's unwind runs. The stale session is still registered and not
    // yet closed, so the reconnect is an ordinary displacement.
    let stale = hub.connect(7, "ada").await;
    let event = watcher.recv_of(MessageType::PresenceEvent).await;
    assert_eq!(event.payload["event"], "user_online");

    let fresh = hub.connect(7, "ada").await;

    // The stale session's unwind races in afterwards: it must neither evict
    // the successor nor mark the user offline.
    hub.disconnect(&stale).await;

    assert!(hub.hub.registry.is_online(7));
    assert_eq!(
        hub.hub.registry.lookup(7).unwrap().session_id,
        fresh.session.session_id
    );
    watcher.expect_silence().await;

    let row = hub.hub.db.presence().get(7).await.unwrap().unwrap();
    assert_eq!(row.status, "online");
}

#[tokio::test]
async fn offline_contacts_are_skipped_silently() {
    let hub = contacts_hub().await;
    // 9 never connects; 7's transitions must not error.
    let seven = hub.connect(7, "ada").await;
    hub.disconnect(&seven).await;

    let row = hub.hub.db.presence().get(7).await.unwrap().unwrap();
    assert_eq!(row.status, "offline");
}

#[tokio::test]
async fn non_contacts_see_nothing() {
    let hub = contacts_hub().await;
    hub.seed_user(11, "sam").await;
    let mut outsider = hub.connect(11, "sam").await;

    let _seven = hub.connect(7, "ada").await;
    outsider.expect_silence().await;
}

#[tokio::test]
async fn presence_store_tracks_transitions() {
    let hub = contacts_hub().await;

    let seven = hub.connect(7, "ada").await;
    let online = hub.hub.db.presence().get(7).await.unwrap().unwrap();
    assert_eq!(online.status, "online");

    hub.disconnect(&seven).await;
    let offline = hub.hub.db.presence().get(7).await.unwrap().unwrap();
    assert_eq!(offline.status, "offline");
    assert!(offline.last_seen_ms >= online.last_seen_ms);
}
