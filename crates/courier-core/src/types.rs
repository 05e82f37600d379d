// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared by the Courier crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CourierError;

/// Dashboard role of the local user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
}

/// The logged-in principal a channel is opened for.
///
/// Two identities are the same principal when user id and role match; the
/// bearer token is carried along but does not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id && self.role == other.role
    }
}

impl Eq for Identity {}

// --- Channel ---

/// Lifecycle state of the persistent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
}

impl ChannelState {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// Forward moves go one step at a time; every state may drop back to
    /// `Disconnected`.
    pub fn can_transition_to(self, next: ChannelState) -> bool {
        use ChannelState::*;
        matches!(
            (self, next),
            (_, Disconnected)
                | (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connected, Authenticated)
        )
    }
}

/// Why a disconnected channel stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// Reconnect attempts exhausted.
    Unreachable,
    /// The server rejected the handshake.
    AuthRejected,
}

/// Read-only snapshot of the channel owned by the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub identity: Option<Identity>,
    pub state: ChannelState,
    pub reconnect_attempt: u32,
    pub terminal: Option<TerminalReason>,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            identity: None,
            state: ChannelState::Disconnected,
            reconnect_attempt: 0,
            terminal: None,
        }
    }
}

impl Channel {
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            ChannelState::Connected | ChannelState::Authenticated
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == ChannelState::Authenticated
    }
}

/// Raw named event as delivered by the channel. Not retained past dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Where an inbound event came from. All sources share one dedup rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EventSource {
    Channel,
    Polling,
    Push,
}

// --- Priority ---

/// Urgency shared by conversations and notifications.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    #[serde(alias = "urgent")]
    Emergency,
}

impl Priority {
    /// High and emergency items bypass routine-chatter filtering.
    pub fn bypasses_quiet(self) -> bool {
        self >= Priority::High
    }
}

// --- Conversations ---

/// Support conversation lifecycle.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Waiting,
    Resolved,
    Archived,
}

impl ConversationStatus {
    /// Active and waiting conversations make up the working set.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Waiting)
    }

    /// Lifecycle is active ⇄ waiting → resolved → archived.
    pub fn can_transition_to(self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, next),
            (Active, Waiting)
                | (Waiting, Active)
                | (Active, Resolved)
                | (Waiting, Resolved)
                | (Resolved, Archived)
                | (Active, Archived)
                | (Waiting, Archived)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub counterparty_id: String,
    pub counterparty_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub status: ConversationStatus,
    pub priority: Priority,
    pub assigned_agent_id: Option<String>,
}

/// Who authored a message, relative to the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum SenderRole {
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    Own,
    #[serde(rename = "other")]
    #[strum(serialize = "other")]
    Other,
}

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

/// Input to [`Message::apply`].
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// The backend accepted the send and assigned its own id and timestamp.
    Confirmed { server_id: String, sent_at: DateTime<Utc> },
    /// The backend rejected the send.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_role: SenderRole,
    pub body: String,
    #[serde(default)]
    pub attachment_ref: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub delivery_state: DeliveryState,
}

/// A conversation together with its ordered message log, as cached offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Prefix of locally generated message ids.
pub const TEMP_ID_PREFIX: &str = "tmp-";

impl Message {
    /// Builds an optimistic local message with a fresh temp id.
    pub fn optimistic(
        conversation_id: impl Into<String>,
        body: impl Into<String>,
        attachment_ref: Option<String>,
    ) -> Self {
        Self {
            id: format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            sender_role: SenderRole::Own,
            body: body.into(),
            attachment_ref,
            sent_at: Utc::now(),
            delivery_state: DeliveryState::Pending,
        }
    }

    pub fn is_temp(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// The single authoritative delivery transition.
    ///
    /// Only pending messages move; confirmation rewrites the id to the
    /// server id so later echoes match by identity.
    pub fn apply(&mut self, event: DeliveryEvent) -> Result<(), CourierError> {
        if self.delivery_state != DeliveryState::Pending {
            let to = match &event {
                DeliveryEvent::Confirmed { .. } => DeliveryState::Confirmed,
                DeliveryEvent::Failed => DeliveryState::Failed,
            };
            return Err(CourierError::InvalidTransition {
                from: self.delivery_state.to_string(),
                to: to.to_string(),
            });
        }
        match event {
            DeliveryEvent::Confirmed { server_id, sent_at } => {
                self.id = server_id;
                self.sent_at = sent_at;
                self.delivery_state = DeliveryState::Confirmed;
            }
            DeliveryEvent::Failed => {
                self.delivery_state = DeliveryState::Failed;
            }
        }
        Ok(())
    }
}

// --- Notifications ---

/// Category of a feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    Delivery,
    Emergency,
    Status,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub priority: Priority,
    pub ttl_secs: u64,
    #[serde(default)]
    pub source_data: serde_json::Value,
}

impl NotificationItem {
    /// Builds an item with a fresh id, the current time, and the given TTL.
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
        ttl_secs: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
            priority,
            ttl_secs,
            source_data: serde_json::Value::Null,
        }
    }

    pub fn with_source(mut self, data: serde_json::Value) -> Self {
        self.source_data = data;
        self
    }
}

/// Semantic audio cue classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SoundClass {
    Routine,
    Success,
    Alert,
    Delivery,
}

/// A transient on-screen banner.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

/// Side effects raised by the sync core for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Fired exactly once per feed push.
    Alert {
        item_id: String,
        sound: Option<SoundClass>,
        banner: Option<Banner>,
    },
    /// Persistent offline indicator, raised and cleared on edges only.
    OfflineIndicator { visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

// --- REST collaborator contracts ---

/// Body of the send-message call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Temp id of the optimistic entry; echoed back by servers that support it.
    pub client_id: String,
    pub conversation_id: Option<String>,
    pub recipient_id: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// The server's view of a stored message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub body: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
}

/// One page of message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub messages: Vec<RemoteMessage>,
    pub page: u32,
    #[serde(default)]
    pub has_more: bool,
}

/// The server's view of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConversation {
    pub id: String,
    pub counterparty_id: String,
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
}

impl From<RemoteConversation> for Conversation {
    fn from(r: RemoteConversation) -> Self {
        Self {
            counterparty_name: r
                .counterparty_name
                .unwrap_or_else(|| r.counterparty_id.clone()),
            id: r.id,
            counterparty_id: r.counterparty_id,
            last_message: r.last_message,
            last_message_at: r.last_message_at,
            unread_count: r.unread_count,
            status: r.status,
            priority: r.priority,
            assigned_agent_id: r.assigned_agent_id,
        }
    }
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
