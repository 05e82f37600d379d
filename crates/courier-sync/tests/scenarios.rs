// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over a harness-built core.

use std::time::Duration;

use serde_json::json;

use courier_bus::Verdict;
use courier_core::{DeliveryState, EventSource, NotificationKind, SenderRole};
use courier_sw::{ClickOutcome, PushPayload, click};
use courier_test_utils::{
    Failure, LinkBehavior, MockBackend, MockTransport, TestHarness, remote_message,
};

fn hello() -> serde_json::Value {
    json!({ "id": "m1", "message": "hello", "counterpartyId": "d1" })
}

#[tokio::test]
async fn inbound_message_creates_one_unread_conversation() {
    let h = TestHarness::admin("a1").build().unwrap();
    h.start_online().await.unwrap();

    assert!(h.deliver("driver-message", hello()).await);
    assert!(h.eventually(|| h.core.conversations().len() == 1).await);

    let conversations = h.core.conversations();
    assert_eq!(conversations[0].id, "d1");
    assert_eq!(conversations[0].counterparty_id, "d1");
    assert_eq!(conversations[0].unread_count, 1);
    let messages = h.core.messages("d1");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "m1");
    assert_eq!(messages[0].sender_role, SenderRole::Other);

    assert_eq!(h.core.feed().len(), 1);
    assert_eq!(h.effects.alerts().len(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn redelivered_message_is_stored_once() {
    let h = TestHarness::admin("a1").build().unwrap();
    h.start_online().await.unwrap();

    h.deliver("driver-message", hello()).await;
    h.deliver("driver-message", hello()).await;
    assert!(h.eventually(|| h.core.messages("d1").len() == 1).await);
    h.settle().await;

    assert_eq!(h.core.messages("d1").len(), 1);
    assert_eq!(h.core.conversation("d1").unwrap().unread_count, 1);
    assert_eq!(h.core.feed().len(), 1);
    assert_eq!(h.effects.alerts().len(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn polled_copy_of_a_channel_message_is_a_duplicate() {
    let h = TestHarness::admin("a1").build().unwrap();
    h.start_online().await.unwrap();
    h.deliver("driver-message", hello()).await;
    assert!(h.eventually(|| h.core.messages("d1").len() == 1).await);

    h.backend.push_history(remote_message("m1", "d1", "d1", "hello"));
    assert_eq!(h.core.poll_once().await.unwrap(), 0);
    assert_eq!(h.core.messages("d1").len(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn failed_send_while_offline_is_pending_then_removed_with_one_error() {
    let backend = MockBackend::new("d7").with_send_delay(Duration::from_millis(100));
    backend.fail_next("send_message", Failure::Unreachable);
    let h = TestHarness::driver("d7")
        .with_transport(MockTransport::with_default(LinkBehavior::FailOpen))
        .with_backend(backend)
        .build()
        .unwrap();

    let conversation_id = h.core.support_conversation_id();
    let core = h.core.clone();
    let id = conversation_id.clone();
    let send = tokio::spawn(async move { core.send_message(&id, "hi", None).await });

    assert!(
        h.eventually(|| h
            .core
            .messages(&conversation_id)
            .iter()
            .any(|m| m.body == "hi" && m.delivery_state == DeliveryState::Pending))
            .await
    );

    let err = send.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("send failed"), "{err}");
    assert!(h.core.messages(&conversation_id).is_empty());

    let errors: Vec<_> = h
        .core
        .feed()
        .items()
        .into_iter()
        .filter(|i| i.kind == NotificationKind::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(h.backend.sent().is_empty());
}

#[tokio::test]
async fn repeated_connect_while_connecting_opens_once() {
    let h = TestHarness::admin("a1")
        .with_transport(MockTransport::with_default(LinkBehavior::Hang))
        .build()
        .unwrap();

    let identity = h.core.identity().clone();
    for _ in 0..5 {
        h.core.connection().connect(identity.clone());
    }
    h.settle().await;
    assert_eq!(h.transport.open_count(), 1);

    h.transport.release();
    assert!(h.eventually(|| h.core.channel().is_authenticated()).await);
    assert_eq!(h.transport.open_count(), 1);
    h.core.connection().shutdown().await;
}

#[tokio::test]
async fn delivery_push_renders_to_broadcasts_and_merges_with_the_channel() {
    let h = TestHarness::driver("d7").build().unwrap();
    h.start_online().await.unwrap();

    let push = json!({ "type": "delivery_assigned", "code": "GX123", "id": "p1" });
    let rendered = PushPayload::parse(&push).render();
    assert_eq!(
        click(&rendered, None),
        ClickOutcome::Open("/driver/delivery-broadcasts".into())
    );

    assert_eq!(h.core.ingest_push(&push).unwrap(), Verdict::Accept);
    assert_eq!(h.core.ingest_push(&push).unwrap(), Verdict::Duplicate);
    h.deliver("delivery-assigned", json!({ "id": "p1", "code": "GX123" })).await;

    let items = h.core.feed().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, NotificationKind::Delivery);
    assert!(items[0].message.contains("GX123"));
    h.shutdown().await;
}

#[tokio::test]
async fn own_messages_echoed_back_are_ignored() {
    let h = TestHarness::driver("d7").build().unwrap();
    h.start_online().await.unwrap();

    let echo = json!({ "id": "m9", "message": "on my way", "senderId": "d7" });
    h.deliver("driver-message", echo).await;
    let marked = json!({ "id": "m10", "message": "copy", "isFromSender": true });
    h.deliver("admin-message", marked).await;
    h.settle().await;

    assert!(h.core.conversations().is_empty());
    assert!(h.core.feed().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn malformed_events_are_rejected_without_side_effects() {
    let h = TestHarness::admin("a1").build().unwrap();
    let raw = courier_core::InboundEvent {
        name: "driver-message".into(),
        payload: json!({ "id": 5 }),
        received_at: chrono::Utc::now(),
    };
    assert!(h.core.ingest(&raw, EventSource::Channel).is_err());
    assert!(h.core.conversations().is_empty());
    assert!(h.core.feed().is_empty());
}

#[tokio::test]
async fn missing_audio_degrades_to_silent_alerts() {
    let h = TestHarness::admin("a1")
        .with_audio(courier_test_utils::RecordingAudio::unavailable())
        .build()
        .unwrap();
    h.start_online().await.unwrap();

    h.deliver("driver-message", hello()).await;
    h.deliver("emergency-alert", json!({ "id": "e1", "message": "help" })).await;
    assert!(h.eventually(|| h.effects.alerts().len() == 2).await);

    assert_eq!(h.audio.init_count(), 1);
    assert_eq!(h.audio.play_count(), 0);
    h.shutdown().await;
}
