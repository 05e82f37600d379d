// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed event union for everything the channel can deliver.
//!
//! Wire frames are `{"event": "<name>", "data": {...}}`. Each event name maps
//! to exactly one [`ChannelEvent`] variant with its own payload struct, so
//! handlers match exhaustively instead of probing optional fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CourierError;
use crate::types::{GeoPoint, InboundEvent, Priority, Role};

/// Names of channel events, inbound and outbound.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EventName {
    DriverMessage,
    AdminMessage,
    NewNotification,
    DeliveryAssigned,
    EmergencyAlert,
    DriverStatusChanged,
    DeliveryStatusChanged,
    DriverTyping,
    AdminTyping,
}

impl EventName {
    /// Every event name, in declaration order.
    pub const ALL: [EventName; 9] = [
        EventName::DriverMessage,
        EventName::AdminMessage,
        EventName::NewNotification,
        EventName::DeliveryAssigned,
        EventName::EmergencyAlert,
        EventName::DriverStatusChanged,
        EventName::DeliveryStatusChanged,
        EventName::DriverTyping,
        EventName::AdminTyping,
    ];

    /// Chat message event emitted by a user of the given role.
    pub fn message_from(role: Role) -> Self {
        match role {
            Role::Admin => EventName::AdminMessage,
            Role::Driver => EventName::DriverMessage,
        }
    }

    /// Typing event emitted by a user of the given role.
    pub fn typing_from(role: Role) -> Self {
        match role {
            Role::Admin => EventName::AdminTyping,
            Role::Driver => EventName::DriverTyping,
        }
    }
}

/// A chat line from a driver or an admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_role: Option<Role>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub counterparty_id: Option<String>,
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub is_from_sender: bool,
}

/// A generic backend notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub is_from_sender: bool,
}

/// A delivery was assigned or broadcast to drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub delivery_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pickup: Option<String>,
    #[serde(default)]
    pub dropoff: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub is_from_sender: bool,
}

/// A driver raised an emergency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_from_sender: bool,
}

/// A driver or delivery changed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "driverId", alias = "deliveryId")]
    pub subject_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub is_from_sender: bool,
}

/// The counterparty started or stopped typing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub counterparty_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_typing: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_from_sender: bool,
}

fn default_true() -> bool {
    true
}

/// One decoded inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChannelEvent {
    DriverMessage(ChatMessageEvent),
    AdminMessage(ChatMessageEvent),
    NewNotification(NotificationEvent),
    DeliveryAssigned(DeliveryEvent),
    EmergencyAlert(EmergencyEvent),
    DriverStatusChanged(StatusEvent),
    DeliveryStatusChanged(StatusEvent),
    DriverTyping(TypingEvent),
    AdminTyping(TypingEvent),
}

impl ChannelEvent {
    /// Decodes a raw inbound event into its typed variant.
    pub fn decode(raw: &InboundEvent) -> Result<Self, CourierError> {
        let frame = serde_json::json!({ "event": raw.name, "data": raw.payload });
        serde_json::from_value(frame)
            .map_err(|e| CourierError::Codec(format!("event `{}`: {e}", raw.name)))
    }

    pub fn name(&self) -> EventName {
        match self {
            Self::DriverMessage(_) => EventName::DriverMessage,
            Self::AdminMessage(_) => EventName::AdminMessage,
            Self::NewNotification(_) => EventName::NewNotification,
            Self::DeliveryAssigned(_) => EventName::DeliveryAssigned,
            Self::EmergencyAlert(_) => EventName::EmergencyAlert,
            Self::DriverStatusChanged(_) => EventName::DriverStatusChanged,
            Self::DeliveryStatusChanged(_) => EventName::DeliveryStatusChanged,
            Self::DriverTyping(_) => EventName::DriverTyping,
            Self::AdminTyping(_) => EventName::AdminTyping,
        }
    }

    /// Server-assigned id, when the payload carries one.
    pub fn stable_id(&self) -> Option<&str> {
        match self {
            Self::DriverMessage(e) | Self::AdminMessage(e) => e.id.as_deref(),
            Self::NewNotification(e) => e.id.as_deref(),
            Self::DeliveryAssigned(e) => e.id.as_deref(),
            Self::EmergencyAlert(e) => e.id.as_deref(),
            Self::DriverStatusChanged(e) | Self::DeliveryStatusChanged(e) => e.id.as_deref(),
            Self::DriverTyping(_) | Self::AdminTyping(_) => None,
        }
    }

    /// Text that identifies the occurrence when no stable id is present.
    pub fn body(&self) -> String {
        match self {
            Self::DriverMessage(e) | Self::AdminMessage(e) => e.message.clone(),
            Self::NewNotification(e) => e.message.clone(),
            Self::DeliveryAssigned(e) => e
                .code
                .clone()
                .or_else(|| e.delivery_id.clone())
                .or_else(|| e.message.clone())
                .unwrap_or_default(),
            Self::EmergencyAlert(e) => e.message.clone(),
            Self::DriverStatusChanged(e) | Self::DeliveryStatusChanged(e) => {
                format!("{}:{}", e.subject_id, e.status)
            }
            Self::DriverTyping(e) | Self::AdminTyping(e) => {
                e.sender_id.clone().unwrap_or_default()
            }
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::DriverMessage(e) | Self::AdminMessage(e) => e.timestamp,
            Self::NewNotification(e) => e.timestamp,
            Self::DeliveryAssigned(e) => e.timestamp,
            Self::EmergencyAlert(e) => e.timestamp,
            Self::DriverStatusChanged(e) | Self::DeliveryStatusChanged(e) => e.timestamp,
            Self::DriverTyping(e) | Self::AdminTyping(e) => e.timestamp,
        }
    }

    /// The user that caused the event, if the payload names one.
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Self::DriverMessage(e) | Self::AdminMessage(e) => e.sender_id.as_deref(),
            Self::NewNotification(e) => e.sender_id.as_deref(),
            Self::DeliveryAssigned(e) => e.sender_id.as_deref(),
            Self::EmergencyAlert(e) => e.sender_id.as_deref(),
            Self::DriverStatusChanged(e) | Self::DeliveryStatusChanged(e) => {
                e.sender_id.as_deref()
            }
            Self::DriverTyping(e) | Self::AdminTyping(e) => e.sender_id.as_deref(),
        }
    }

    /// Explicit from-self marker set by the server on rebroadcasts.
    pub fn marked_from_self(&self) -> bool {
        match self {
            Self::DriverMessage(e) | Self::AdminMessage(e) => e.is_from_sender,
            Self::NewNotification(e) => e.is_from_sender,
            Self::DeliveryAssigned(e) => e.is_from_sender,
            Self::EmergencyAlert(e) => e.is_from_sender,
            Self::DriverStatusChanged(e) | Self::DeliveryStatusChanged(e) => e.is_from_sender,
            Self::DriverTyping(e) | Self::AdminTyping(e) => e.is_from_sender,
        }
    }

    /// Typing indicators carry no lasting state and skip fingerprinting.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::DriverTyping(_) | Self::AdminTyping(_))
    }
}
