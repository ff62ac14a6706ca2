//! Contact lifecycle: request, accept/reject, chat provisioning, and the
//! state-machine guards.

mod common;

use common::{TestHub, client_request};
use serde_json::json;
use trellis_proto::MessageType;

async fn two_users() -> TestHub {
    let hub = TestHub::new().await;
    hub.seed_user(7, "ada").await;
    hub.seed_user(9, "grace").await;
    hub
}

#[tokio::test]
async fn request_then_accept_provisions_chat() {
    let hub = two_users().await;
    let mut requester = hub.connect(7, "ada").await;
    let mut recipient = hub.connect(9, "grace").await;

    // 7 opens the request.
    let reply = hub
        .request(
            &requester,
            client_request(MessageType::FriendRequest, 1, json!({"toUserId": 9})),
        )
        .await
        .unwrap();
    assert_eq!(reply.payload["status"], "pending");
    let contact_id = reply.payload["contactId"].as_i64().unwrap();

    // The pending row has no chat id, and 7 is the requester.
    let row = hub.hub.db.contacts().find_by_id(contact_id).await.unwrap().unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.requester_id, 7);
    assert!(row.chat_id.is_none());

    // 9 gets an actionable notification, enriched with 7's profile.
    let pushed = recipient.recv_of(MessageType::NewNotification).await;
    assert_eq!(pushed.payload["eventType"], "friend_request");
    assert_eq!(pushed.payload["actionRequired"], true);
    assert_eq!(pushed.payload["requesterId"], 7);
    assert_eq!(pushed.payload["contactId"], contact_id);
    assert_eq!(pushed.payload["otherUser"]["username"], "ada");
    let notification_id = pushed.payload["id"].as_i64().unwrap();

    // 9 accepts through the notification.
    let outcome = hub
        .request(
            &recipient,
            client_request(
                MessageType::FriendRequestResponse,
                2,
                json!({"notificationId": notification_id, "accept": true}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(outcome.payload["status"], "accepted");
    let chat_id = outcome.payload["chatId"].as_str().unwrap().to_string();

    // The row carries the freshly provisioned chat id.
    let row = hub.hub.db.contacts().find_by_id(contact_id).await.unwrap().unwrap();
    assert_eq!(row.status, "accepted");
    assert_eq!(row.chat_id.as_deref(), Some(chat_id.as_str()));

    // Contact symmetry: both participants resolve the same chat id.
    let from_7 = hub.hub.db.contacts().accepted_chat_id(7, 9).await.unwrap();
    let from_9 = hub.hub.db.contacts().accepted_chat_id(9, 7).await.unwrap();
    assert_eq!(from_7.as_deref(), Some(chat_id.as_str()));
    assert_eq!(from_7, from_9);

    // The requester hears about the outcome.
    let response = requester.recv_of(MessageType::NewNotification).await;
    assert_eq!(response.payload["eventType"], "request_response");
    assert_eq!(response.payload["status"], "accepted");
    assert_eq!(response.payload["otherUser"]["userId"], 9);
}

#[tokio::test]
async fn duplicate_request_conflicts() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;

    hub.request(
        &requester,
        client_request(MessageType::FriendRequest, 1, json!({"toUserId": 9})),
    )
    .await;
    let reply = hub
        .request(
            &requester,
            client_request(MessageType::FriendRequest, 2, json!({"toUserId": 9})),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "conflict");
}

#[tokio::test]
async fn self_request_conflicts() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;
    let reply = hub
        .request(
            &requester,
            client_request(MessageType::FriendRequest, 1, json!({"toUserId": 7})),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "conflict");
}

#[tokio::test]
async fn request_to_unknown_user_fails() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;
    let reply = hub
        .request(
            &requester,
            client_request(MessageType::FriendRequest, 1, json!({"toUserId": 404})),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "not_found");
}

#[tokio::test]
async fn reject_is_terminal_and_leaves_no_chat() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;
    let mut recipient = hub.connect(9, "grace").await;

    hub.request(
        &requester,
        client_request(MessageType::FriendRequest, 1, json!({"toUserId": 9})),
    )
    .await;
    let pushed = recipient.recv_of(MessageType::NewNotification).await;
    let notification_id = pushed.payload["id"].as_i64().unwrap();
    let contact_id = pushed.payload["contactId"].as_i64().unwrap();

    let outcome = hub
        .request(
            &recipient,
            client_request(
                MessageType::FriendRequestResponse,
                2,
                json!({"notificationId": notification_id, "accept": false}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(outcome.payload["status"], "rejected");
    assert!(outcome.payload["chatId"].is_null());

    let row = hub.hub.db.contacts().find_by_id(contact_id).await.unwrap().unwrap();
    assert_eq!(row.status, "rejected");
    assert!(row.chat_id.is_none());

    // Accepting after a reject is a state-machine violation.
    let late = hub
        .request(
            &recipient,
            client_request(
                MessageType::FriendRequestResponse,
                3,
                json!({"notificationId": notification_id, "accept": true}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(late.error.unwrap().code, "conflict");
}

#[tokio::test]
async fn repeated_accept_is_noop_success() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;
    let mut recipient = hub.connect(9, "grace").await;

    hub.request(
        &requester,
        client_request(MessageType::FriendRequest, 1, json!({"toUserId": 9})),
    )
    .await;
    let pushed = recipient.recv_of(MessageType::NewNotification).await;
    let notification_id = pushed.payload["id"].as_i64().unwrap();

    let first = hub
        .request(
            &recipient,
            client_request(
                MessageType::FriendRequestResponse,
                2,
                json!({"notificationId": notification_id, "accept": true}),
            ),
        )
        .await
        .unwrap();
    let chat_id = first.payload["chatId"].as_str().unwrap().to_string();

    let second = hub
        .request(
            &recipient,
            client_request(
                MessageType::FriendRequestResponse,
                3,
                json!({"notificationId": notification_id, "accept": true}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(second.payload["status"], "accepted");
    // The chat id is stable across repeats, never regenerated.
    assert_eq!(second.payload["chatId"].as_str().unwrap(), chat_id);
}

#[tokio::test]
async fn only_the_recipient_may_respond() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;
    let mut recipient = hub.connect(9, "grace").await;

    hub.request(
        &requester,
        client_request(MessageType::FriendRequest, 1, json!({"toUserId": 9})),
    )
    .await;
    let pushed = recipient.recv_of(MessageType::NewNotification).await;
    let notification_id = pushed.payload["id"].as_i64().unwrap();

    // The requester answering their own request: the notification belongs
    // to the recipient, so it reads as absent.
    let reply = hub
        .request(
            &requester,
            client_request(
                MessageType::FriendRequestResponse,
                2,
                json!({"notificationId": notification_id, "accept": true}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(reply.error.unwrap().code, "not_found");
}

#[tokio::test]
async fn cancel_retracts_the_recipients_prompt() {
    let hub = two_users().await;
    let requester = hub.connect(7, "ada").await;
    let mut recipient = hub.connect(9, "grace").await;

    hub.request(
        &requester,
        client_request(MessageType::FriendRequest, 1, json!({"toUserId": 9})),
    )
    .await;
    let pushed = recipient.recv_of(MessageType::NewNotification).await;
    let notification_id = pushed.payload["id"].as_i64().unwrap();
    let contact_id = pushed.payload["contactId"].as_i64().unwrap();

    hub.hub.contacts.cancel(7, contact_id).await.unwrap();

    let row = hub.hub.db.contacts().find_by_id(contact_id).await.unwrap().unwrap();
    assert_eq!(row.status, "cancelled");
    assert!(row.chat_id.is_none());

    // The recipient's notification no longer demands action.
    let event = hub.hub.db.events().get(notification_id).await.unwrap().unwrap();
    assert!(!event.action_required);
    assert_eq!(event.status, "cancelled");

    // Answering a cancelled request is a conflict.
    let late = hub
        .request(
            &recipient,
            client_request(
                MessageType::FriendRequestResponse,
                2,
                json!({"notificationId": notification_id, "accept": true}),
            ),
        )
        .await
        .unwrap();
    assert_eq!(late.error.unwrap().code, "conflict");
}
