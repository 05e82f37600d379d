// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin presentation adapters over one [`SyncCore`].
//!
//! Each adapter registers its own subscription token on the core's router
//! and removes exactly its own registrations when dropped. Adapters keep
//! only view counters; conversation and feed state live in the core.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::debug;

use courier_bus::SubscriptionToken;
use courier_core::types::Attachment;
use courier_core::{
    Conversation, ConversationStatus, CourierError, EventName, Message, NotificationItem,
};
use courier_conversation::StatusChange;

use crate::core::SyncCore;

#[derive(Debug, Default)]
struct ViewCounters {
    /// Routed events since the user last looked.
    unseen: AtomicUsize,
    /// Bumped on every routed event; views compare it to decide a redraw.
    revision: AtomicU64,
}

/// One token registered under a fixed set of event names.
struct Registration {
    core: SyncCore,
    token: SubscriptionToken,
    names: &'static [EventName],
}

impl Registration {
    fn new(
        core: &SyncCore,
        prefix: &str,
        names: &'static [EventName],
        counters: &Arc<ViewCounters>,
    ) -> Self {
        let token = SubscriptionToken::unique(prefix);
        for name in names {
            let counters = Arc::clone(counters);
            core.router().subscribe(*name, token.clone(), move |_, _| {
                counters.unseen.fetch_add(1, Ordering::Relaxed);
                counters.revision.fetch_add(1, Ordering::Relaxed);
            });
        }
        debug!(%token, events = names.len(), "adapter attached");
        Self {
            core: core.clone(),
            token,
            names,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        for name in self.names {
            self.core.router().unsubscribe(*name, &self.token);
        }
        debug!(token = %self.token, "adapter detached");
    }
}

const ADMIN_BELL_EVENTS: &[EventName] = &[
    EventName::DriverMessage,
    EventName::NewNotification,
    EventName::EmergencyAlert,
    EventName::DriverStatusChanged,
    EventName::DeliveryStatusChanged,
];

const DRIVER_BELL_EVENTS: &[EventName] = &[
    EventName::AdminMessage,
    EventName::NewNotification,
    EventName::DeliveryAssigned,
    EventName::DeliveryStatusChanged,
];

const ADMIN_INBOX_EVENTS: &[EventName] = &[
    EventName::DriverMessage,
    EventName::DriverTyping,
    EventName::EmergencyAlert,
];

const SUPPORT_CHAT_EVENTS: &[EventName] = &[EventName::AdminMessage, EventName::AdminTyping];

macro_rules! bell {
    ($(#[$doc:meta])* $name:ident, $prefix:literal, $events:expr) => {
        $(#[$doc])*
        pub struct $name {
            core: SyncCore,
            counters: Arc<ViewCounters>,
            registration: Registration,
        }

        impl $name {
            pub fn attach(core: &SyncCore) -> Self {
                let counters = Arc::new(ViewCounters::default());
                let registration = Registration::new(core, $prefix, $events, &counters);
                Self {
                    core: core.clone(),
                    counters,
                    registration,
                }
            }

            /// Badge count: events routed here since [`Self::mark_seen`].
            pub fn unseen(&self) -> usize {
                self.counters.unseen.load(Ordering::Relaxed)
            }

            pub fn mark_seen(&self) {
                self.counters.unseen.store(0, Ordering::Relaxed);
            }

            /// Live feed items, newest first.
            pub fn items(&self) -> Vec<NotificationItem> {
                self.core.feed().items()
            }

            pub fn dismiss(&self, id: &str) -> bool {
                self.core.feed().dismiss(id)
            }

            pub fn token(&self) -> &SubscriptionToken {
                &self.registration.token
            }
        }
    };
}

bell!(
    /// The admin notification bell: driver chatter, emergencies, status.
    AdminBell,
    "admin-bell",
    ADMIN_BELL_EVENTS
);

bell!(
    /// The driver notification bell: support replies and delivery news.
    DriverBell,
    "driver-bell",
    DRIVER_BELL_EVENTS
);

/// The admin multi-driver inbox.
pub struct AdminInbox {
    core: SyncCore,
    counters: Arc<ViewCounters>,
    registration: Registration,
}

impl AdminInbox {
    pub fn attach(core: &SyncCore) -> Self {
        let counters = Arc::new(ViewCounters::default());
        let registration = Registration::new(core, "admin-inbox", ADMIN_INBOX_EVENTS, &counters);
        Self {
            core: core.clone(),
            counters,
            registration,
        }
    }

    pub fn token(&self) -> &SubscriptionToken {
        &self.registration.token
    }

    pub fn revision(&self) -> u64 {
        self.counters.revision.load(Ordering::Relaxed)
    }

    /// Open conversations, most recent first.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.core.conversations()
    }

    pub fn total_unread(&self) -> u32 {
        self.core.total_unread()
    }

    pub async fn open(&self, conversation_id: &str) -> Result<Vec<Message>, CourierError> {
        self.core.select_conversation(conversation_id).await?;
        Ok(self.core.messages(conversation_id))
    }

    pub fn close(&self) {
        self.core.clear_selection();
    }

    pub fn messages(&self) -> Vec<Message> {
        self.core
            .active_id()
            .map(|id| self.core.messages(&id))
            .unwrap_or_default()
    }

    pub fn is_driver_typing(&self, conversation_id: &str) -> bool {
        self.core.is_typing(conversation_id)
    }

    pub async fn reply(
        &self,
        conversation_id: &str,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message, CourierError> {
        self.core.send_message(conversation_id, body, attachment).await
    }

    pub fn typing(&self, conversation_id: &str, typing: bool) -> bool {
        self.core.send_typing(conversation_id, typing)
    }

    pub async fn set_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<StatusChange, CourierError> {
        self.core.set_status(conversation_id, status).await
    }

    pub async fn assign(&self, conversation_id: &str, agent_id: &str) -> Result<(), CourierError> {
        self.core.assign(conversation_id, agent_id).await
    }

    pub async fn delete(&self, conversation_id: &str) -> Result<(), CourierError> {
        self.core.delete(conversation_id).await
    }
}

/// The driver's support chat: a single thread with whoever answers.
pub struct DriverSupportChat {
    core: SyncCore,
    counters: Arc<ViewCounters>,
    registration: Registration,
}

impl DriverSupportChat {
    pub fn attach(core: &SyncCore) -> Self {
        let counters = Arc::new(ViewCounters::default());
        let registration =
            Registration::new(core, "support-chat", SUPPORT_CHAT_EVENTS, &counters);
        Self {
            core: core.clone(),
            counters,
            registration,
        }
    }

    pub fn token(&self) -> &SubscriptionToken {
        &self.registration.token
    }

    pub fn revision(&self) -> u64 {
        self.counters.revision.load(Ordering::Relaxed)
    }

    pub fn conversation_id(&self) -> String {
        self.core.support_conversation_id()
    }

    /// Focuses the support thread, clearing its unread count.
    pub async fn open(&self) -> Result<(), CourierError> {
        let id = self.conversation_id();
        self.core.select_conversation(&id).await
    }

    pub fn messages(&self) -> Vec<Message> {
        self.core.messages(&self.conversation_id())
    }

    pub fn is_support_typing(&self) -> bool {
        self.core.is_typing(&self.conversation_id())
    }

    pub async fn send(
        &self,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message, CourierError> {
        let id = self.conversation_id();
        self.core.send_message(&id, body, attachment).await
    }

    pub async fn send_emergency(&self, body: &str) -> Result<Message, CourierError> {
        self.core.send_emergency(body).await
    }

    pub fn typing(&self, typing: bool) -> bool {
        self.core.send_typing(&self.conversation_id(), typing)
    }
}
