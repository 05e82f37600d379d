// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push payloads: rendering to platform notifications, click routing, and
//! conversion into the inbound event union.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use courier_core::{EventName, InboundEvent, Role};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePush {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "message")]
    pub body: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_role: Option<Role>,
    pub conversation_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryPush {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "message")]
    pub body: Option<String>,
    pub code: Option<String>,
    pub delivery_id: Option<String>,
    pub pickup: Option<String>,
    pub dropoff: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenericPush {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "message")]
    pub body: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushPayload {
    Message(MessagePush),
    Delivery(DeliveryPush),
    DeliveryBroadcast(DeliveryPush),
    DeliveryAssigned(DeliveryPush),
    Generic(GenericPush),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PushKind {
    Message,
    Delivery,
    DeliveryBroadcast,
    DeliveryAssigned,
    Generic,
}

impl PushKind {
    /// Where a click on this kind of notification leads.
    pub fn route(self) -> &'static str {
        match self {
            PushKind::Message => "/messages",
            PushKind::Delivery | PushKind::DeliveryBroadcast | PushKind::DeliveryAssigned => {
                "/driver/delivery-broadcasts"
            }
            PushKind::Generic => "/",
        }
    }

    pub fn actions(self) -> Vec<NotificationAction> {
        let view = NotificationAction::new(ActionKind::View, "View");
        let close = NotificationAction::new(ActionKind::Close, "Dismiss");
        match self {
            PushKind::Message => {
                vec![NotificationAction::new(ActionKind::View, "Open chat"), close]
            }
            PushKind::Delivery | PushKind::DeliveryBroadcast | PushKind::DeliveryAssigned => vec![
                NotificationAction::new(ActionKind::Accept, "Accept"),
                view,
                close,
            ],
            PushKind::Generic => vec![view, close],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    View,
    Accept,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: ActionKind,
    pub title: String,
}

impl NotificationAction {
    fn new(action: ActionKind, title: &str) -> Self {
        Self {
            action,
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub kind: PushKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// What the platform is asked to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace each other.
    pub tag: String,
    pub icon: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Focus an open window on `url`, or open a new one.
    Open(String),
    Close,
}

const ICON: &str = "/icons/icon-192.png";

impl PushPayload {
    /// Parses a push body. Anything without a known `type` is generic.
    pub fn parse(raw: &serde_json::Value) -> Self {
        match serde_json::from_value(raw.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "treating push payload as generic");
                let text = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(str::to_string);
                PushPayload::Generic(GenericPush {
                    id: text("id"),
                    title: text("title"),
                    body: text("body").or_else(|| text("message")),
                    url: text("url"),
                })
            }
        }
    }

    pub fn kind(&self) -> PushKind {
        match self {
            PushPayload::Message(_) => PushKind::Message,
            PushPayload::Delivery(_) => PushKind::Delivery,
            PushPayload::DeliveryBroadcast(_) => PushKind::DeliveryBroadcast,
            PushPayload::DeliveryAssigned(_) => PushKind::DeliveryAssigned,
            PushPayload::Generic(_) => PushKind::Generic,
        }
    }

    pub fn render(&self) -> PlatformNotification {
        let kind = self.kind();
        let (title, body, tag, code, conversation_id, url) = match self {
            PushPayload::Message(m) => {
                let title = m.title.clone().unwrap_or_else(|| match &m.sender_name {
                    Some(name) => format!("New message from {name}"),
                    None => "New message".to_string(),
                });
                let key = m.conversation_id.as_deref().or(m.id.as_deref()).unwrap_or("latest");
                (
                    title,
                    m.body.clone().unwrap_or_default(),
                    format!("message-{key}"),
                    None,
                    m.conversation_id.clone(),
                    kind.route().to_string(),
                )
            }
            PushPayload::Delivery(d)
            | PushPayload::DeliveryBroadcast(d)
            | PushPayload::DeliveryAssigned(d) => {
                let default_title = match kind {
                    PushKind::DeliveryBroadcast => "New delivery available",
                    PushKind::DeliveryAssigned => "Delivery assigned",
                    _ => "Delivery update",
                };
                let body = d.body.clone().unwrap_or_else(|| delivery_summary(kind, d));
                let key = d.code.as_deref().or(d.delivery_id.as_deref()).unwrap_or("latest");
                (
                    d.title.clone().unwrap_or_else(|| default_title.to_string()),
                    body,
                    format!("delivery-{key}"),
                    d.code.clone(),
                    None,
                    kind.route().to_string(),
                )
            }
            PushPayload::Generic(g) => (
                g.title.clone().unwrap_or_else(|| "Courier".to_string()),
                g.body.clone().unwrap_or_default(),
                format!("generic-{}", g.id.as_deref().unwrap_or("latest")),
                None,
                None,
                g.url.clone().unwrap_or_else(|| kind.route().to_string()),
            ),
        };

        PlatformNotification {
            title,
            body,
            tag,
            icon: ICON.to_string(),
            require_interaction: matches!(
                kind,
                PushKind::DeliveryBroadcast | PushKind::DeliveryAssigned
            ),
            actions: kind.actions(),
            data: NotificationData {
                kind,
                url,
                code,
                conversation_id,
            },
        }
    }

    /// The same occurrence as an inbound channel event, so push delivery
    /// merges through the regular dedup path.
    pub fn to_inbound(&self) -> InboundEvent {
        let (name, payload) = match self {
            PushPayload::Message(m) => {
                let name = EventName::message_from(m.sender_role.unwrap_or(Role::Driver));
                let mut payload = serde_json::json!({
                    "message": m.body.clone().unwrap_or_default(),
                    "senderId": m.sender_id,
                    "senderName": m.sender_name,
                    "senderRole": m.sender_role,
                    "conversationId": m.conversation_id,
                    "counterpartyId": m.sender_id,
                });
                insert_common(&mut payload, m.id.as_deref(), m.timestamp);
                (name, payload)
            }
            PushPayload::Delivery(d)
            | PushPayload::DeliveryBroadcast(d)
            | PushPayload::DeliveryAssigned(d) => {
                let mut payload = serde_json::json!({
                    "code": d.code,
                    "deliveryId": d.delivery_id,
                    "message": d.body,
                    "pickup": d.pickup,
                    "dropoff": d.dropoff,
                });
                insert_common(&mut payload, d.id.as_deref(), d.timestamp);
                (EventName::DeliveryAssigned, payload)
            }
            PushPayload::Generic(g) => {
                let mut payload = serde_json::json!({
                    "title": g.title,
                    "message": g.body.clone().or_else(|| g.title.clone()).unwrap_or_default(),
                    "data": { "url": g.url },
                });
                insert_common(&mut payload, g.id.as_deref(), None);
                (EventName::NewNotification, payload)
            }
        };
        InboundEvent {
            name: name.to_string(),
            payload,
            received_at: Utc::now(),
        }
    }
}

fn insert_common(payload: &mut serde_json::Value, id: Option<&str>, at: Option<DateTime<Utc>>) {
    if let Some(obj) = payload.as_object_mut() {
        if let Some(id) = id {
            obj.insert("id".into(), id.into());
        }
        if let Some(at) = at {
            obj.insert("timestamp".into(), at.to_rfc3339().into());
        }
    }
}

fn delivery_summary(kind: PushKind, d: &DeliveryPush) -> String {
    let code = d
        .code
        .as_deref()
        .or(d.delivery_id.as_deref())
        .unwrap_or("a delivery");
    let route = match (&d.pickup, &d.dropoff) {
        (Some(from), Some(to)) => format!(" ({from} to {to})"),
        _ => String::new(),
    };
    match kind {
        PushKind::DeliveryAssigned => format!("{code} has been assigned to you{route}"),
        PushKind::DeliveryBroadcast => format!("{code} is open for pickup{route}"),
        _ => format!("{code} was updated{route}"),
    }
}

/// Resolves a click. `None` is a click on the notification body.
pub fn click(notification: &PlatformNotification, action: Option<ActionKind>) -> ClickOutcome {
    let data = &notification.data;
    match action {
        Some(ActionKind::Close) => ClickOutcome::Close,
        Some(ActionKind::Accept) => match &data.code {
            Some(code) => ClickOutcome::Open(format!("{}?accept={code}", data.url)),
            None => ClickOutcome::Open(data.url.clone()),
        },
        Some(ActionKind::View) | None => ClickOutcome::Open(data.url.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ChannelEvent;

    #[test]
    fn delivery_assigned_routes_to_broadcasts() {
        let payload = PushPayload::parse(&serde_json::json!({
            "type": "delivery_assigned",
            "code": "GX123"
        }));
        assert_eq!(payload.kind(), PushKind::DeliveryAssigned);

        let n = payload.render();
        assert_eq!(n.title, "Delivery assigned");
        assert!(n.body.contains("GX123"));
        assert!(n.require_interaction);
        let actions: Vec<_> = n.actions.iter().map(|a| a.action).collect();
        assert_eq!(
            actions,
            vec![ActionKind::Accept, ActionKind::View, ActionKind::Close]
        );
        assert_eq!(
            click(&n, None),
            ClickOutcome::Open("/driver/delivery-broadcasts".into())
        );
        assert_eq!(
            click(&n, Some(ActionKind::Accept)),
            ClickOutcome::Open("/driver/delivery-broadcasts?accept=GX123".into())
        );
        assert_eq!(click(&n, Some(ActionKind::Close)), ClickOutcome::Close);
    }

    #[test]
    fn message_push_opens_chat() {
        let payload = PushPayload::parse(&serde_json::json!({
            "type": "message",
            "message": "running late",
            "senderName": "Dana",
            "conversationId": "c1"
        }));
        let n = payload.render();
        assert_eq!(n.title, "New message from Dana");
        assert_eq!(n.body, "running late");
        assert_eq!(n.tag, "message-c1");
        assert!(!n.require_interaction);
        assert_eq!(click(&n, Some(ActionKind::View)), ClickOutcome::Open("/messages".into()));
    }

    #[test]
    fn unknown_type_is_generic() {
        let payload = PushPayload::parse(&serde_json::json!({
            "type": "promo",
            "title": "Hello",
            "url": "/promo"
        }));
        assert_eq!(payload.kind(), PushKind::Generic);
        let n = payload.render();
        assert_eq!(n.title, "Hello");
        assert_eq!(click(&n, None), ClickOutcome::Open("/promo".into()));
        let actions: Vec<_> = n.actions.iter().map(|a| a.action).collect();
        assert_eq!(actions, vec![ActionKind::View, ActionKind::Close]);
    }

    #[test]
    fn push_converts_to_decodable_events() {
        let cases = [
            serde_json::json!({"type": "delivery_broadcast", "code": "GX1", "id": "p1"}),
            serde_json::json!({"type": "delivery", "deliveryId": "D-9"}),
            serde_json::json!({
                "type": "message",
                "id": "m1",
                "message": "hi",
                "senderId": "a1",
                "senderRole": "admin",
            }),
            serde_json::json!({"title": "Plain"}),
        ];
        let names: Vec<_> = cases
            .iter()
            .map(|raw| {
                let event = ChannelEvent::decode(&PushPayload::parse(raw).to_inbound()).unwrap();
                event.name()
            })
            .collect();
        assert_eq!(
            names,
            vec![
                EventName::DeliveryAssigned,
                EventName::DeliveryAssigned,
                EventName::AdminMessage,
                EventName::NewNotification,
            ]
        );
    }

    #[test]
    fn message_push_keeps_its_stable_id() {
        let raw =
            serde_json::json!({"type": "message", "id": "m1", "message": "hi", "senderId": "d1"});
        let event = ChannelEvent::decode(&PushPayload::parse(&raw).to_inbound()).unwrap();
        assert_eq!(event.stable_id(), Some("m1"));
        assert_eq!(event.actor_id(), Some("d1"));
    }
}
