// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure mappings from wire shapes to store inputs and feed items.

use chrono::Utc;
use serde_json::json;

use courier_core::events::{ChatMessageEvent, TypingEvent};
use courier_core::types::RemoteMessage;
use courier_core::{
    ChannelEvent, DeliveryState, EventName, InboundEvent, Message, NotificationItem,
    NotificationKind, Priority, Role, SenderRole,
};
use courier_conversation::IncomingMessage;

/// Counterparty id of a driver's single support thread.
pub const SUPPORT_COUNTERPARTY: &str = "support";
pub const SUPPORT_NAME: &str = "Support";

/// Who the local user is talking to in a chat or typing event.
///
/// Drivers have one thread, with support, whoever on the admin side
/// answered.
pub fn counterparty_of(
    role: Role,
    counterparty_id: Option<&str>,
    sender_id: Option<&str>,
) -> String {
    match role {
        Role::Driver => SUPPORT_COUNTERPARTY.to_string(),
        Role::Admin => counterparty_id
            .or(sender_id)
            .unwrap_or(SUPPORT_COUNTERPARTY)
            .to_string(),
    }
}

pub fn incoming_from_chat(chat: &ChatMessageEvent, id: String, role: Role) -> IncomingMessage {
    let counterparty_id =
        counterparty_of(role, chat.counterparty_id.as_deref(), chat.sender_id.as_deref());
    let counterparty_name = match role {
        Role::Driver => Some(SUPPORT_NAME.to_string()),
        Role::Admin => chat
            .counterparty_name
            .clone()
            .or_else(|| chat.sender_name.clone()),
    };
    IncomingMessage {
        id,
        conversation_id: chat.conversation_id.clone(),
        counterparty_id,
        counterparty_name,
        body: chat.message.clone(),
        attachment_ref: chat.attachment_url.clone(),
        sent_at: chat.timestamp,
        priority: chat.priority.unwrap_or_default(),
    }
}

pub fn typing_counterparty(typing: &TypingEvent, role: Role) -> String {
    counterparty_of(role, typing.counterparty_id.as_deref(), typing.sender_id.as_deref())
}

/// Feed item for a chat line the user is not looking at.
pub fn chat_notification(chat: &ChatMessageEvent, conversation_id: &str) -> NotificationItem {
    let title = match chat.sender_name.as_deref().or(chat.sender_id.as_deref()) {
        Some(name) => format!("New message from {name}"),
        None => "New message".to_string(),
    };
    NotificationItem::new(
        NotificationKind::Message,
        title,
        chat.message.clone(),
        chat.priority.unwrap_or_default(),
        0,
    )
    .with_source(json!({ "conversationId": conversation_id, "messageId": chat.id }))
}

/// Feed item for a non-chat event. Chat and typing events return `None`.
pub fn notification_for(event: &ChannelEvent) -> Option<NotificationItem> {
    let item = match event {
        ChannelEvent::NewNotification(n) => {
            let kind = n.kind.as_deref().map_or(NotificationKind::System, kind_from_label);
            NotificationItem::new(
                kind,
                n.title.clone().unwrap_or_else(|| "Notification".to_string()),
                n.message.clone(),
                n.priority.unwrap_or_default(),
                0,
            )
            .with_source(n.data.clone().unwrap_or_default())
        }
        ChannelEvent::DeliveryAssigned(d) => {
            let label = d
                .code
                .as_deref()
                .or(d.delivery_id.as_deref())
                .unwrap_or("A delivery");
            let message = d.message.clone().unwrap_or_else(|| match (&d.pickup, &d.dropoff) {
                (Some(from), Some(to)) => format!("{label} from {from} to {to}"),
                _ => format!("{label} is waiting for you"),
            });
            NotificationItem::new(
                NotificationKind::Delivery,
                "New delivery assigned",
                message,
                d.priority.unwrap_or(Priority::High),
                0,
            )
            .with_source(json!({
                "deliveryId": d.delivery_id,
                "code": d.code,
                "pickup": d.pickup,
                "dropoff": d.dropoff,
            }))
        }
        ChannelEvent::EmergencyAlert(e) => {
            let who = e
                .sender_name
                .as_deref()
                .or(e.sender_id.as_deref())
                .unwrap_or("a driver");
            NotificationItem::new(
                NotificationKind::Emergency,
                format!("Emergency from {who}"),
                e.message.clone(),
                Priority::Emergency,
                0,
            )
            .with_source(json!({
                "senderId": e.sender_id,
                "conversationId": e.conversation_id,
                "location": e.location,
            }))
        }
        ChannelEvent::DriverStatusChanged(s) => NotificationItem::new(
            NotificationKind::Status,
            "Driver status",
            s.message
                .clone()
                .unwrap_or_else(|| format!("Driver {} is now {}", s.subject_id, s.status)),
            Priority::Low,
            0,
        )
        .with_source(json!({ "driverId": s.subject_id, "status": s.status })),
        ChannelEvent::DeliveryStatusChanged(s) => NotificationItem::new(
            NotificationKind::Status,
            "Delivery status",
            s.message
                .clone()
                .unwrap_or_else(|| format!("Delivery {} is now {}", s.subject_id, s.status)),
            Priority::Normal,
            0,
        )
        .with_source(json!({ "deliveryId": s.subject_id, "status": s.status })),
        ChannelEvent::DriverMessage(_)
        | ChannelEvent::AdminMessage(_)
        | ChannelEvent::DriverTyping(_)
        | ChannelEvent::AdminTyping(_) => return None,
    };
    Some(item)
}

fn kind_from_label(label: &str) -> NotificationKind {
    match label.to_ascii_lowercase().as_str() {
        "message" | "chat" => NotificationKind::Message,
        "delivery" => NotificationKind::Delivery,
        "emergency" => NotificationKind::Emergency,
        "status" => NotificationKind::Status,
        "error" => NotificationKind::Error,
        _ => NotificationKind::System,
    }
}

/// Error item raised once per failed user action.
pub fn error_notification(title: &str, detail: &str) -> NotificationItem {
    NotificationItem::new(NotificationKind::Error, title, detail, Priority::High, 0)
}

/// A server message as a log entry, from the local user's point of view.
pub fn message_from_remote(remote: RemoteMessage, local_user: &str) -> Message {
    let sender_role = if remote.sender_id == local_user {
        SenderRole::Own
    } else {
        SenderRole::Other
    };
    Message {
        id: remote.id,
        conversation_id: remote.conversation_id,
        sender_role,
        body: remote.body,
        attachment_ref: remote.attachment_url,
        sent_at: remote.sent_at,
        delivery_state: DeliveryState::Confirmed,
    }
}

/// A polled history entry as the chat event the channel would have carried.
pub fn inbound_from_remote(remote: &RemoteMessage, local_role: Role) -> InboundEvent {
    let from = match local_role {
        Role::Admin => Role::Driver,
        Role::Driver => Role::Admin,
    };
    let name = EventName::message_from(from);
    InboundEvent {
        name: name.to_string(),
        payload: json!({
            "id": remote.id,
            "message": remote.body,
            "timestamp": remote.sent_at,
            "senderId": remote.sender_id,
            "senderName": remote.sender_name,
            "conversationId": remote.conversation_id,
            "counterpartyId": remote.sender_id,
            "priority": remote.priority,
            "attachmentUrl": remote.attachment_url,
        }),
        received_at: Utc::now(),
    }
}
