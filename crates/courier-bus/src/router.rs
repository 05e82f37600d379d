// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of decoded events to subscribed handlers.
//!
//! Handlers are keyed by `(EventName, SubscriptionToken)`. Removal always
//! names both halves of the key, so one component tearing down can never
//! drop handlers owned by another.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use courier_core::{ChannelEvent, EventName, EventSource};

/// Identifies the owner of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(String);

impl SubscriptionToken {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// A token that cannot collide with any other, prefixed for logs.
    pub fn unique(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type Handler = Arc<dyn Fn(&ChannelEvent, EventSource) + Send + Sync>;

type HandlerMap = HashMap<EventName, Vec<(SubscriptionToken, Handler)>>;

#[derive(Default)]
pub struct EventRouter {
    handlers: RwLock<HandlerMap>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `(name, token)`, replacing any handler
    /// already held by that exact pair.
    pub fn subscribe<F>(&self, name: EventName, token: SubscriptionToken, handler: F)
    where
        F: Fn(&ChannelEvent, EventSource) + Send + Sync + 'static,
    {
        let mut map = self.write();
        let slot = map.entry(name).or_default();
        let handler: Handler = Arc::new(handler);
        match slot.iter_mut().find(|(t, _)| *t == token) {
            Some(existing) => existing.1 = handler,
            None => slot.push((token.clone(), handler)),
        }
        debug!(event = %name, %token, "subscribed");
    }

    /// Removes exactly the `(name, token)` subscription. Returns whether one existed.
    pub fn unsubscribe(&self, name: EventName, token: &SubscriptionToken) -> bool {
        let mut map = self.write();
        let Some(slot) = map.get_mut(&name) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|(t, _)| t != token);
        let removed = slot.len() != before;
        if slot.is_empty() {
            map.remove(&name);
        }
        if removed {
            debug!(event = %name, %token, "unsubscribed");
        }
        removed
    }

    /// Calls every handler registered for the event's name.
    ///
    /// Handlers run outside the lock so they may subscribe or unsubscribe.
    pub fn dispatch(&self, event: &ChannelEvent, source: EventSource) -> usize {
        let targets: Vec<Handler> = self
            .read()
            .get(&event.name())
            .map(|slot| slot.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in &targets {
            handler(event, source);
        }
        targets.len()
    }

    pub fn is_subscribed(&self, name: EventName, token: &SubscriptionToken) -> bool {
        self.read()
            .get(&name)
            .is_some_and(|slot| slot.iter().any(|(t, _)| t == token))
    }

    pub fn handler_count(&self, name: EventName) -> usize {
        self.read().get(&name).map_or(0, Vec::len)
    }

    pub fn subscription_count(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    fn read(&self) -> RwLockReadGuard<'_, HandlerMap> {
        self.handlers.read().unwrap_or_else(|poisoned| {
            warn!("router lock poisoned, continuing");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HandlerMap> {
        self.handlers.write().unwrap_or_else(|poisoned| {
            warn!("router lock poisoned, continuing");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use courier_core::InboundEvent;

    fn driver_message() -> ChannelEvent {
        ChannelEvent::decode(&InboundEvent {
            name: "driver-message".into(),
            payload: serde_json::json!({"id": "m1", "message": "hello"}),
            received_at: Utc::now(),
        })
        .unwrap()
    }

    fn counter(router: &EventRouter, token: &str) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        router.subscribe(
            EventName::DriverMessage,
            SubscriptionToken::new(token),
            move |_, _| {
                h.fetch_add(1, Ordering::SeqCst);
            },
        );
        hits
    }

    #[test]
    fn dispatch_reaches_every_subscriber() {
        let router = EventRouter::new();
        let a = counter(&router, "bell");
        let b = counter(&router, "inbox");
        assert_eq!(router.dispatch(&driver_message(), EventSource::Channel), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_only_the_exact_pair() {
        let router = EventRouter::new();
        let bell = counter(&router, "bell");
        let inbox = counter(&router, "inbox");

        assert!(router.unsubscribe(EventName::DriverMessage, &SubscriptionToken::new("bell")));
        router.dispatch(&driver_message(), EventSource::Channel);

        assert_eq!(bell.load(Ordering::SeqCst), 0);
        assert_eq!(inbox.load(Ordering::SeqCst), 1);
        assert_eq!(router.handler_count(EventName::DriverMessage), 1);
    }

    #[test]
    fn unsubscribe_under_other_name_is_a_no_op() {
        let router = EventRouter::new();
        let _bell = counter(&router, "bell");
        assert!(!router.unsubscribe(EventName::AdminMessage, &SubscriptionToken::new("bell")));
        assert!(router.is_subscribed(EventName::DriverMessage, &SubscriptionToken::new("bell")));
    }

    #[test]
    fn resubscribing_same_pair_replaces_handler() {
        let router = EventRouter::new();
        let first = counter(&router, "bell");
        let second = counter(&router, "bell");
        router.dispatch(&driver_message(), EventSource::Polling);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(router.subscription_count(), 1);
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let router = Arc::new(EventRouter::new());
        let r = Arc::clone(&router);
        router.subscribe(
            EventName::DriverMessage,
            SubscriptionToken::new("once"),
            move |_, _| {
                r.unsubscribe(EventName::DriverMessage, &SubscriptionToken::new("once"));
            },
        );
        assert_eq!(router.dispatch(&driver_message(), EventSource::Channel), 1);
        assert_eq!(router.dispatch(&driver_message(), EventSource::Channel), 0);
    }

    #[test]
    fn unique_tokens_differ() {
        assert_ne!(SubscriptionToken::unique("x"), SubscriptionToken::unique("x"));
    }
}
