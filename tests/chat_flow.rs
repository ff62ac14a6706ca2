//! Chat delivery: durability before delivery, offline recipients, unread
//! counts, read receipts, and keyset history pagination.

mod common;

use common::{TestHub, client_request};
use serde_json::json;
use std::collections::HashSet;
use trellis_proto::MessageType;
use trellisd::db::NewMessage;

const CHAT: &str = "c-xyz";

async fn chat_hub() -> TestHub {
    let hub = TestHub::new().await;
    hub.seed_user(7, "ada").await;
    hub.seed_user(9, "grace").await;
    hub.seed_accepted_contact(7, 9, CHAT).await;
    hub
}

#[tokio::test]
async fn send_with_both_online_persists_then_delivers() {
    let hub = chat_hub().await;
    let sender = hub.connect(7, "ada").await;
    let mut recipient = hub.connect(9, "grace").await;

    let reply = hub
        .request(
            &sender,
            client_request(
                MessageType::SendChatMessage,
                1,
                json!({"chatId": CHAT, "text": "hello"}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(reply.message_type(), Some(MessageType::SendChatMessage));
    assert_eq!(reply.reply_to_pid, Some(1));
    let ack_id = reply.payload["id"].as_str().unwrap().to_string();

    // Live delivery carries the durable id.
    let pushed = recipient.recv_of(MessageType::NewChatMessage).await;
    assert_eq!(pushed.payload["id"].as_str().unwrap(), ack_id);
    assert_eq!(pushed.payload["senderId"], 7);
    assert_eq!(pushed.payload["text"], "hello");
    assert_eq!(pushed.from_user_id, Some(7));

    // Durability: the delivered id exists in the store with status sent.
    let row = hub.hub.db.messages().get(&ack_id).await.unwrap().unwrap();
    assert_eq!(row.chat_id, CHAT);
    assert_eq!(row.sender_id, 7);
    assert_eq!(row.body, "hello");
    assert_eq!(row.status, 1);
}

#[tokio::test]
async fn send_to_offline_recipient_persists_without_delivery() {
    let hub = chat_hub().await;
    let sender = hub.connect(7, "ada").await;

    let reply = hub
        .request(
            &sender,
            client_request(
                MessageType::SendChatMessage,
                1,
                json!({"chatId": CHAT, "text": "are you there?"}),
            ),
        )
        .await
        .unwrap();
    let ack_id = reply.payload["id"].as_str().unwrap().to_string();
    assert!(hub.hub.db.messages().get(&ack_id).await.unwrap().is_some());

    // Recipient connects later; the chat list shows the backlog.
    let late = hub.connect(9, "grace").await;
    let list = hub
        .request(&late, client_request(MessageType::GetChatList, 2, json!({})))
        .await
        .unwrap();
    let chats = list.payload["chats"].as_array().unwrap();
    let entry = chats
        .iter()
        .find(|c| c["chatId"] == CHAT)
        .expect("chat present in list");
    assert!(entry["unreadCount"].as_i64().unwrap() >= 1);
    assert_eq!(entry["lastMessage"]["text"], "are you there?");
    assert_eq!(entry["user"]["userId"], 7);
    // Online flag is stamped from the registry, not the store.
    assert_eq!(entry["online"], true);
}

#[tokio::test]
async fn resolve_by_peer_user_id() {
    let hub = chat_hub().await;
    let sender = hub.connect(7, "ada").await;

    let reply = hub
        .request(
            &sender,
            client_request(
                MessageType::SendChatMessage,
                1,
                json!({"toUserId": 9, "text": "via user id"}),
            ),
        )
        .await
        .unwrap();
    // The chat id is the one on the Contact row, never derived.
    assert_eq!(reply.payload["chatId"], CHAT);
}

#[tokio::test]
async fn send_without_contact_is_rejected() {
    let hub = TestHub::new().await;
    hub.seed_user(7, "ada").await;
    hub.seed_user(11, "sam").await;
    let sender = hub.connect(7, "ada").await;

    let reply = hub
        .request(
            &sender,
            client_request(
                MessageType::SendChatMessage,
                1,
                json!({"toUserId": 11, "text": "hi"}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "not_contacts");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let hub = chat_hub().await;
    let sender = hub.connect(7, "ada").await;

    let reply = hub
        .request(
            &sender,
            client_request(
                MessageType::SendChatMessage,
                1,
                json!({"chatId": CHAT, "text": "   "}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "empty_message");
}

#[tokio::test]
async fn read_receipts_are_monotonic_and_idempotent() {
    let hub = chat_hub().await;
    let sender = hub.connect(7, "ada").await;
    let reader = hub.connect(9, "grace").await;

    for text in ["one", "two", "three"] {
        hub.request(
            &sender,
            client_request(
                MessageType::SendChatMessage,
                1,
                json!({"chatId": CHAT, "text": text}),
            ),
        )
        .await;
    }

    let reply = hub
        .request(
            &reader,
            client_request(MessageType::MarkMessagesRead, 2, json!({"chatId": CHAT})),
        )
        .await
        .unwrap();
    assert_eq!(reply.payload["updated"], 3);

    // Repeating the transition touches nothing.
    let again = hub
        .request(
            &reader,
            client_request(MessageType::MarkMessagesRead, 3, json!({"chatId": CHAT})),
        )
        .await
        .unwrap();
    assert_eq!(again.payload["updated"], 0);

    // The sender's own rows are untouched by the reader's receipt.
    let unread_for_sender = hub.hub.db.messages().unread_count(CHAT, 7).await.unwrap();
    assert_eq!(unread_for_sender, 0);
}

#[tokio::test]
async fn history_keyset_pagination_visits_every_message_once() {
    let hub = chat_hub().await;

    // 75 rows; five share each timestamp so the id tiebreak is exercised.
    let base_ms = 1_700_000_000_000_i64;
    for i in 0..75 {
        hub.hub
            .db
            .messages()
            .insert(NewMessage {
                id: &format!("m-{i:03}"),
                chat_id: CHAT,
                sender_id: if i % 2 == 0 { 7 } else { 9 },
                body: &format!("message {i}"),
                media_id: None,
                reply_to: None,
                sent_at_ms: base_ms + (i / 5) * 1_000,
                type_id: 1,
            })
            .await
            .unwrap();
    }

    let reader = hub.connect(9, "grace").await;
    let mut seen: HashSet<String> = HashSet::new();
    let mut anchor: Option<String> = None;
    let mut sizes = Vec::new();

    loop {
        let mut payload = json!({"chatId": CHAT, "limit": 30});
        if let Some(anchor) = &anchor {
            payload["beforeMessageId"] = json!(anchor);
        }
        let reply = hub
            .request(
                &reader,
                client_request(MessageType::GetChatHistory, 1, payload),
            )
            .await
            .unwrap();
        let messages = reply.payload["messages"].as_array().unwrap().clone();
        sizes.push(messages.len());
        if messages.is_empty() {
            break;
        }

        // Newest-first within the page.
        let times: Vec<i64> = messages
            .iter()
            .map(|m| {
                chrono::DateTime::parse_from_rfc3339(m["sentAt"].as_str().unwrap())
                    .unwrap()
                    .timestamp_millis()
            })
            .collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));

        for m in &messages {
            let id = m["id"].as_str().unwrap().to_string();
            assert!(seen.insert(id), "duplicate message across pages");
        }
        anchor = Some(
            messages
                .last()
                .unwrap()["id"]
                .as_str()
                .unwrap()
                .to_string(),
        );
    }

    assert_eq!(sizes, vec![30, 30, 15, 0]);
    assert_eq!(seen.len(), 75);
}

#[tokio::test]
async fn history_requires_membership() {
    let hub = chat_hub().await;
    hub.seed_user(11, "sam").await;
    let outsider = hub.connect(11, "sam").await;

    let reply = hub
        .request(
            &outsider,
            client_request(MessageType::GetChatHistory, 1, json!({"chatId": CHAT})),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "not_contacts");
}

#[tokio::test]
async fn typing_for_foreign_or_unknown_chat_is_silently_ignored() {
    let hub = chat_hub().await;
    hub.seed_user(11, "sam").await;
    let mut outsider = hub.connect(11, "sam").await;
    let mut member = hub.connect(9, "grace").await;

    // An outsider pokes at a chat it does not belong to: no error frame
    // back, nothing relayed to the members.
    let reply = hub
        .request(
            &outsider,
            client_request(MessageType::Typing, 1, json!({"chatId": CHAT})),
        )
        .await;
    assert!(reply.is_none());
    outsider.expect_silence().await;
    member.expect_silence().await;

    // Same for a chat id that resolves to nothing at all.
    let reply = hub
        .request(
            &outsider,
            client_request(MessageType::Typing, 2, json!({"chatId": "c-nowhere"})),
        )
        .await;
    assert!(reply.is_none());
    outsider.expect_silence().await;
    assert!(!outsider.session.is_closed());
}

#[tokio::test]
async fn typing_relays_to_peer_only() {
    let hub = chat_hub().await;
    let sender = hub.connect(7, "ada").await;
    let mut peer = hub.connect(9, "grace").await;

    let reply = hub
        .request(
            &sender,
            client_request(MessageType::Typing, 1, json!({"chatId": CHAT, "active": true})),
        )
        .await;
    // Transient: no reply to the sender.
    assert!(reply.is_none());

    let relayed = peer.recv_of(MessageType::Typing).await;
    assert_eq!(relayed.from_user_id, Some(7));
    assert_eq!(relayed.payload["chatId"], CHAT);
}
