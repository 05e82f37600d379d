// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use courier_core::types::{Attachment, RemoteConversation};
use courier_core::{
    ConversationStatus, CourierError, DeliveryState, NotificationKind, Priority, SenderRole,
};
use courier_sync::DriverSupportChat;
use courier_test_utils::{
    Failure, LinkBehavior, MemoryKv, MockBackend, MockLocation, MockTransport, TestHarness,
    remote_message,
};

fn photo() -> Attachment {
    Attachment {
        file_name: "pod.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: vec![0xff, 0xd8, 0xff],
    }
}

fn items_of(h: &TestHarness, kind: NotificationKind) -> usize {
    h.core
        .feed()
        .items()
        .iter()
        .filter(|i| i.kind == kind)
        .count()
}

fn error_items(h: &TestHarness) -> usize {
    items_of(h, NotificationKind::Error)
}

async fn admin_with_thread(from: &str, ids: &[&str]) -> TestHarness {
    let h = TestHarness::admin("a1").build().unwrap();
    h.start_online().await.unwrap();
    for id in ids {
        h.deliver(
            "driver-message",
            json!({ "id": id, "message": format!("msg {id}"), "senderId": from }),
        )
        .await;
    }
    assert!(h.eventually(|| h.core.messages(from).len() == ids.len()).await);
    h
}

#[tokio::test]
async fn confirmed_send_takes_the_server_id_and_its_echo_is_dropped() {
    let h = TestHarness::driver("d7").build().unwrap();
    h.start_online().await.unwrap();
    let chat = DriverSupportChat::attach(&h.core);

    let sent = chat.send("on my way", None).await.unwrap();
    assert_eq!(sent.id, "srv-1");
    assert_eq!(sent.delivery_state, DeliveryState::Confirmed);

    let log = chat.messages();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, "srv-1");

    let request = &h.backend.sent()[0];
    assert!(request.client_id.starts_with("tmp-"));
    assert_eq!(request.recipient_id, None);

    assert_eq!(h.core.poll_once().await.unwrap(), 0);
    assert_eq!(chat.messages().len(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn attachment_is_uploaded_before_the_send() {
    let h = TestHarness::driver("d7").build().unwrap();
    let chat = DriverSupportChat::attach(&h.core);

    let sent = chat.send("delivered", Some(photo())).await.unwrap();
    assert_eq!(sent.attachment_ref.as_deref(), Some("https://files.test/pod.jpg"));
    assert_eq!(h.backend.calls(), vec!["upload_attachment", "send_message"]);
    assert_eq!(
        h.backend.sent()[0].attachment_url.as_deref(),
        Some("https://files.test/pod.jpg")
    );
}

#[tokio::test]
async fn failed_upload_blocks_the_send() {
    let h = TestHarness::driver("d7").build().unwrap();
    h.backend.fail_next("upload_attachment", Failure::Status(413));
    let chat = DriverSupportChat::attach(&h.core);

    let err = chat.send("delivered", Some(photo())).await.unwrap_err();
    assert!(matches!(err, CourierError::AttachmentUpload { .. }), "{err}");
    assert!(chat.messages().is_empty());
    assert_eq!(h.backend.call_count("send_message"), 0);
    assert_eq!(error_items(&h), 1);
}

#[tokio::test]
async fn sending_to_an_unknown_conversation_is_not_found() {
    let h = TestHarness::admin("a1").build().unwrap();
    let err = h.core.send_message("nope", "hi", None).await.unwrap_err();
    assert!(matches!(err, CourierError::NotFound { kind: "conversation", .. }));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn emergency_carries_location_when_available() {
    let h = TestHarness::driver("d7")
        .with_location(MockLocation::at(51.5, -0.12))
        .build()
        .unwrap();
    let chat = DriverSupportChat::attach(&h.core);

    chat.send_emergency("vehicle breakdown").await.unwrap();
    let request = &h.backend.sent()[0];
    assert_eq!(request.priority, Priority::Emergency);
    let location = request.location.unwrap();
    assert_eq!((location.lat, location.lng), (51.5, -0.12));
}

#[tokio::test]
async fn emergency_goes_out_without_location_after_the_timeout() {
    let h = TestHarness::driver("d7")
        .with_config(|c| c.location.timeout_ms = 50)
        .with_location(MockLocation::hanging())
        .build()
        .unwrap();

    h.core.send_emergency("accident").await.unwrap();
    let request = &h.backend.sent()[0];
    assert_eq!(request.priority, Priority::Emergency);
    assert!(request.location.is_none());
}

#[tokio::test]
async fn selecting_clears_unread_and_sends_one_receipt() {
    let h = admin_with_thread("d1", &["m1", "m2"]).await;
    assert_eq!(h.core.total_unread(), 2);

    h.core.select_conversation("d1").await.unwrap();
    assert_eq!(h.core.total_unread(), 0);
    assert_eq!(h.core.active_id().as_deref(), Some("d1"));
    let mut read = h.backend.read_ids();
    read.sort();
    assert_eq!(read, vec!["m1", "m2"]);

    h.deliver("driver-message", json!({ "id": "m3", "message": "there?", "senderId": "d1" }))
        .await;
    assert!(h.eventually(|| h.core.messages("d1").len() == 3).await);
    assert_eq!(h.core.total_unread(), 0);
    assert_eq!(h.core.feed().len(), 2);
    h.shutdown().await;
}

#[tokio::test]
async fn failed_read_receipt_does_not_fail_selection() {
    let h = admin_with_thread("d1", &["m1"]).await;
    h.backend.fail_next("mark_read", Failure::Status(500));

    h.core.select_conversation("d1").await.unwrap();
    assert_eq!(h.core.total_unread(), 0);
    assert_eq!(error_items(&h), 0);
    h.shutdown().await;
}

#[tokio::test]
async fn resolving_the_open_conversation_evicts_it() {
    let h = admin_with_thread("d1", &["m1"]).await;
    h.core.select_conversation("d1").await.unwrap();

    let change = h
        .core
        .set_status("d1", ConversationStatus::Resolved)
        .await
        .unwrap();
    assert!(change.evicted);
    assert!(change.view_cleared);
    assert!(h.core.conversations().is_empty());
    assert_eq!(h.core.active_id(), None);
    assert_eq!(
        h.backend.status_updates(),
        vec![("d1".to_string(), ConversationStatus::Resolved)]
    );
    h.shutdown().await;
}

#[tokio::test]
async fn rejected_status_change_leaves_the_conversation_alone() {
    let h = admin_with_thread("d1", &["m1"]).await;
    h.backend.fail_next("update_conversation_status", Failure::Status(403));

    assert!(h.core.set_status("d1", ConversationStatus::Waiting).await.is_err());
    assert_eq!(h.core.conversation("d1").unwrap().status, ConversationStatus::Active);
    assert_eq!(error_items(&h), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn assign_and_delete_go_through_the_backend() {
    let h = admin_with_thread("d1", &["m1"]).await;

    h.core.assign("d1", "a2").await.unwrap();
    assert_eq!(
        h.core.conversation("d1").unwrap().assigned_agent_id.as_deref(),
        Some("a2")
    );
    h.core.delete("d1").await.unwrap();
    assert!(h.core.conversation("d1").is_none());
    assert!(h.core.messages("d1").is_empty());
    assert_eq!(h.backend.call_count("delete_conversation"), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn last_open_conversation_survives_a_restart() {
    let kv = Arc::new(MemoryKv::new());
    {
        let h = TestHarness::admin("a1").with_kv(kv.clone()).build().unwrap();
        h.start_online().await.unwrap();
        h.deliver("driver-message", json!({ "id": "m1", "message": "hi", "senderId": "d1" }))
            .await;
        assert!(h.eventually(|| h.core.messages("d1").len() == 1).await);
        h.core.select_conversation("d1").await.unwrap();
        h.shutdown().await;
    }

    let h = TestHarness::admin("a1").with_kv(kv).build().unwrap();
    assert!(h.core.rehydrate().await.unwrap());
    assert_eq!(h.core.active_id().as_deref(), Some("d1"));
    let messages = h.core.messages("d1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m1");
}

#[tokio::test]
async fn refresh_replaces_the_list_with_the_servers() {
    let backend = MockBackend::new("a1")
        .with_conversations(vec![RemoteConversation {
            id: "c9".into(),
            counterparty_id: "d9".into(),
            counterparty_name: Some("Noor".into()),
            last_message: Some("ok".into()),
            last_message_at: None,
            unread_count: 3,
            status: ConversationStatus::Waiting,
            priority: Priority::Normal,
            assigned_agent_id: None,
        }])
        .with_conversation_messages("c9", vec![remote_message("r1", "c9", "d9", "ok")]);
    let h = TestHarness::admin("a1").with_backend(backend).build().unwrap();

    h.core.refresh().await.unwrap();
    let conversations = h.core.conversations();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].counterparty_name, "Noor");
    assert_eq!(h.core.total_unread(), 3);

    h.core.select_conversation("c9").await.unwrap();
    h.core.refresh().await.unwrap();
    assert_eq!(h.core.messages("c9")[0].id, "r1");
}

#[tokio::test]
async fn typing_in_both_directions() {
    let h = admin_with_thread("d1", &["m1"]).await;

    h.deliver("driver-typing", json!({ "senderId": "d1", "isTyping": true })).await;
    assert!(h.eventually(|| h.core.is_typing("d1")).await);
    h.deliver("driver-typing", json!({ "senderId": "d1", "isTyping": false })).await;
    assert!(h.eventually(|| !h.core.is_typing("d1")).await);

    assert!(h.core.send_typing("d1", true));
    assert!(
        h.eventually(|| h.transport.sent_events("admin-typing").len() == 1)
            .await
    );
    let frame = &h.transport.sent_events("admin-typing")[0];
    assert_eq!(frame["data"]["conversationId"], "d1");
    assert_eq!(frame["data"]["isTyping"], true);
    h.shutdown().await;
}

#[tokio::test]
async fn offline_indicator_is_raised_and_cleared_once() {
    let h = TestHarness::admin("a1")
        .with_config(|c| c.connection.reconnect_base_delay_ms = 100)
        .build()
        .unwrap();
    h.start_online().await.unwrap();
    assert!(h.effects.offline_changes().is_empty());

    h.transport.drop_link();
    assert!(h.eventually(|| h.effects.offline_changes() == vec![true]).await);
    assert!(h.eventually(|| h.effects.offline_changes() == vec![true, false]).await);
    assert!(h.core.channel().is_authenticated());
    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poller_fills_in_while_the_channel_is_down() {
    let h = TestHarness::admin("a1")
        .with_transport(MockTransport::with_default(LinkBehavior::FailOpen))
        .with_config(|c| {
            c.polling.enabled = true;
            c.polling.interval_secs = 1;
        })
        .build()
        .unwrap();
    h.backend
        .push_history(remote_message("m5", "d2", "d2", "where are you"));
    h.core.start().await.unwrap();

    assert!(h.eventually(|| h.core.messages("d2").len() == 1).await);
    assert_eq!(h.core.conversation("d2").unwrap().unread_count, 1);
    h.shutdown().await;
}

#[tokio::test]
async fn polled_history_already_in_the_list_is_not_counted_again() {
    let backend = MockBackend::new("a1").with_conversations(vec![RemoteConversation {
        id: "c1".into(),
        counterparty_id: "d1".into(),
        counterparty_name: Some("Ravi".into()),
        last_message: Some("second".into()),
        last_message_at: None,
        unread_count: 2,
        status: ConversationStatus::Active,
        priority: Priority::Normal,
        assigned_agent_id: None,
    }]);
    backend.push_history(remote_message("m1", "c1", "d1", "first"));
    backend.push_history(remote_message("m2", "c1", "d1", "second"));
    let h = TestHarness::admin("a1").with_backend(backend).build().unwrap();

    h.core.refresh().await.unwrap();
    assert_eq!(h.core.poll_once().await.unwrap(), 2);
    assert_eq!(h.core.messages("c1").len(), 2);
    assert_eq!(h.core.total_unread(), 2);
    assert_eq!(items_of(&h, NotificationKind::Message), 0);

    tokio::time::sleep(Duration::from_millis(5)).await;
    h.backend.push_history(remote_message("m3", "c1", "d1", "third"));
    assert_eq!(h.core.poll_once().await.unwrap(), 1);
    assert_eq!(h.core.total_unread(), 3);
    assert_eq!(items_of(&h, NotificationKind::Message), 1);
}

#[tokio::test]
async fn echo_arriving_mid_send_becomes_our_own_message() {
    let backend = MockBackend::new("a1").with_send_delay(Duration::from_millis(200));
    let h = TestHarness::admin("a1").with_backend(backend).build().unwrap();
    h.start_online().await.unwrap();
    h.deliver(
        "driver-message",
        json!({ "id": "m0", "message": "where?", "senderId": "d1" }),
    )
    .await;
    assert!(h.eventually(|| h.core.messages("d1").len() == 1).await);

    let core = h.core.clone();
    let send = tokio::spawn(async move { core.send_message("d1", "reply", None).await });
    assert!(h.eventually(|| h.core.messages("d1").len() == 2).await);

    h.deliver(
        "driver-message",
        json!({ "id": "srv-1", "message": "reply", "conversationId": "d1" }),
    )
    .await;
    assert!(h.eventually(|| h.core.messages("d1").len() == 3).await);

    let sent = send.await.unwrap().unwrap();
    assert_eq!(sent.id, "srv-1");
    let log: Vec<(String, SenderRole)> = h
        .core
        .messages("d1")
        .into_iter()
        .map(|m| (m.id, m.sender_role))
        .collect();
    assert_eq!(
        log,
        vec![
            ("m0".to_string(), SenderRole::Other),
            ("srv-1".to_string(), SenderRole::Own),
        ]
    );
    assert_eq!(h.core.conversation("d1").unwrap().unread_count, 1);
    assert_eq!(items_of(&h, NotificationKind::Message), 1);
    h.shutdown().await;
}
