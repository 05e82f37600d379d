// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capped, TTL-bounded notification feed.
//!
//! Every item leaves the feed by exactly one path: its TTL timer, a manual
//! dismissal, or eviction by a newer item. Removal happens under the feed
//! lock, so whichever path gets there first wins and the others become
//! no-ops.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use courier_config::model::NotificationsConfig;
use courier_core::types::Banner;
use courier_core::{
    NotificationItem, NotificationKind, Priority, SideEffect, SideEffectSink, SoundClass,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub capacity: usize,
    /// Applied to items that do not carry their own TTL.
    pub ttl: Duration,
    /// Mute sound and banner for routine items. High priority always alerts.
    pub quiet_routine: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            ttl: Duration::from_secs(10),
            quiet_routine: false,
        }
    }
}

impl From<&NotificationsConfig> for FeedSettings {
    fn from(config: &NotificationsConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            ttl: Duration::from_secs(config.ttl_secs),
            quiet_routine: config.quiet_routine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Expired,
    Dismissed,
    Evicted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Added(NotificationItem),
    Removed { id: String, reason: RemovalReason },
}

struct Entry {
    item: NotificationItem,
    timer: CancellationToken,
}

struct Inner {
    entries: Mutex<VecDeque<Entry>>,
    settings: FeedSettings,
    effects: Arc<dyn SideEffectSink>,
    events: broadcast::Sender<FeedEvent>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, VecDeque<Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: &str, reason: RemovalReason) -> bool {
        let removed = {
            let mut entries = self.entries();
            entries
                .iter()
                .position(|e| e.item.id == id)
                .and_then(|pos| entries.remove(pos))
        };
        let Some(entry) = removed else {
            return false;
        };
        entry.timer.cancel();
        trace!(id, ?reason, "notification removed");
        let _ = self.events.send(FeedEvent::Removed {
            id: id.to_string(),
            reason,
        });
        true
    }
}

/// Shared handle to the feed. Clones observe the same items.
#[derive(Clone)]
pub struct NotificationFeed {
    inner: Arc<Inner>,
}

impl NotificationFeed {
    pub fn new(settings: FeedSettings, effects: Arc<dyn SideEffectSink>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(VecDeque::new()),
                settings,
                effects,
                events,
            }),
        }
    }

    /// Prepends an item, starts its TTL timer and raises one alert.
    /// Must be called from within a tokio runtime.
    pub fn push(&self, mut item: NotificationItem) -> String {
        let ttl = match item.ttl_secs {
            0 => self.inner.settings.ttl,
            secs => Duration::from_secs(secs),
        };
        item.ttl_secs = ttl.as_secs();
        let id = item.id.clone();
        let timer = CancellationToken::new();

        let evicted: Vec<Entry> = {
            let mut entries = self.inner.entries();
            entries.push_front(Entry {
                item: item.clone(),
                timer: timer.clone(),
            });
            let overflow = entries.len().saturating_sub(self.inner.settings.capacity);
            (0..overflow).filter_map(|_| entries.pop_back()).collect()
        };
        for entry in evicted {
            entry.timer.cancel();
            let _ = self.inner.events.send(FeedEvent::Removed {
                id: entry.item.id,
                reason: RemovalReason::Evicted,
            });
        }

        let effect = alert_for(&item, self.inner.settings.quiet_routine);
        debug!(id = %id, kind = %item.kind, priority = %item.priority, "notification pushed");
        let _ = self.inner.events.send(FeedEvent::Added(item));
        spawn_expiry(Arc::downgrade(&self.inner), id.clone(), ttl, timer);
        self.inner.effects.dispatch(effect);
        id
    }

    /// Removes an item before its TTL. Returns false if it is already gone.
    pub fn dismiss(&self, id: &str) -> bool {
        self.inner.remove(id, RemovalReason::Dismissed)
    }

    /// Dismisses every item.
    pub fn clear(&self) {
        let ids: Vec<String> = self
            .inner
            .entries()
            .iter()
            .map(|e| e.item.id.clone())
            .collect();
        for id in ids {
            self.inner.remove(&id, RemovalReason::Dismissed);
        }
    }

    /// Items, newest first.
    pub fn items(&self) -> Vec<NotificationItem> {
        self.inner
            .entries()
            .iter()
            .map(|e| e.item.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.inner.events.subscribe()
    }
}

fn spawn_expiry(inner: Weak<Inner>, id: String, ttl: Duration, timer: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            () = timer.cancelled() => {}
            () = tokio::time::sleep(ttl) => {
                if let Some(inner) = inner.upgrade() {
                    inner.remove(&id, RemovalReason::Expired);
                }
            }
        }
    });
}

/// Sound cue for an item.
pub fn sound_class(item: &NotificationItem) -> SoundClass {
    match (item.kind, item.priority) {
        (_, Priority::Emergency) | (NotificationKind::Emergency | NotificationKind::Error, _) => {
            SoundClass::Alert
        }
        (NotificationKind::Delivery, _) => SoundClass::Delivery,
        (NotificationKind::Status, _) => SoundClass::Success,
        _ => SoundClass::Routine,
    }
}

fn alert_for(item: &NotificationItem, quiet_routine: bool) -> SideEffect {
    let muted = quiet_routine && !item.priority.bypasses_quiet();
    let banner = (!muted && item.priority >= Priority::Normal).then(|| Banner {
        title: item.title.clone(),
        message: item.message.clone(),
        priority: item.priority,
    });
    SideEffect::Alert {
        item_id: item.id.clone(),
        sound: (!muted).then(|| sound_class(item)),
        banner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<SideEffect>>);

    impl SideEffectSink for Recorder {
        fn dispatch(&self, effect: SideEffect) {
            self.0.lock().unwrap().push(effect);
        }
    }

    fn feed(settings: FeedSettings) -> (NotificationFeed, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (NotificationFeed::new(settings, recorder.clone()), recorder)
    }

    fn item(title: &str, priority: Priority) -> NotificationItem {
        NotificationItem::new(NotificationKind::Message, title, "body", priority, 0)
    }

    fn drain(rx: &mut broadcast::Receiver<FeedEvent>) -> Vec<FeedEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn removals(events: &[FeedEvent]) -> Vec<(String, RemovalReason)> {
        events
            .iter()
            .filter_map(|e| match e {
                FeedEvent::Removed { id, reason } => Some((id.clone(), *reason)),
                FeedEvent::Added(_) => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn item_expires_after_ttl_once() {
        let (feed, _) = feed(FeedSettings::default());
        let mut rx = feed.subscribe();
        let id = feed.push(item("a", Priority::Normal));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(feed.len(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(feed.is_empty());

        assert!(!feed.dismiss(&id));
        assert_eq!(removals(&drain(&mut rx)), vec![(id, RemovalReason::Expired)]);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_cancels_the_timer() {
        let (feed, _) = feed(FeedSettings::default());
        let mut rx = feed.subscribe();
        let id = feed.push(item("a", Priority::Normal));

        assert!(feed.dismiss(&id));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            removals(&drain(&mut rx)),
            vec![(id, RemovalReason::Dismissed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_evicts_oldest_and_each_item_leaves_once() {
        let (feed, _) = feed(FeedSettings {
            capacity: 3,
            ..FeedSettings::default()
        });
        let mut rx = feed.subscribe();
        let ids: Vec<String> = (0..5)
            .map(|i| feed.push(item(&format!("n{i}"), Priority::Normal)))
            .collect();

        let titles: Vec<_> = feed.items().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["n4", "n3", "n2"]);

        tokio::time::sleep(Duration::from_secs(11)).await;
        let removed = removals(&drain(&mut rx));
        assert_eq!(removed.len(), 5);
        for id in &ids {
            assert_eq!(removed.iter().filter(|(r, _)| r == id).count(), 1);
        }
        assert_eq!(
            removed
                .iter()
                .filter(|(_, r)| *r == RemovalReason::Evicted)
                .count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn per_item_ttl_overrides_default() {
        let (feed, _) = feed(FeedSettings::default());
        let mut long = item("long", Priority::Normal);
        long.ttl_secs = 60;
        feed.push(long);
        feed.push(item("short", Priority::Normal));

        tokio::time::sleep(Duration::from_secs(11)).await;
        let titles: Vec<_> = feed.items().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["long"]);
    }

    #[tokio::test(start_paused = true)]
    async fn every_push_alerts_once_and_quiet_mode_spares_urgent_items() {
        let (feed, recorder) = feed(FeedSettings {
            quiet_routine: true,
            ..FeedSettings::default()
        });
        feed.push(item("chatter", Priority::Normal));
        feed.push(NotificationItem::new(
            NotificationKind::Emergency,
            "SOS",
            "driver needs help",
            Priority::Emergency,
            0,
        ));

        let effects = recorder.0.lock().unwrap().clone();
        assert_eq!(effects.len(), 2);
        match &effects[0] {
            SideEffect::Alert { sound, banner, .. } => {
                assert_eq!(*sound, None);
                assert_eq!(*banner, None);
            }
            other => panic!("unexpected effect {other:?}"),
        }
        match &effects[1] {
            SideEffect::Alert { sound, banner, .. } => {
                assert_eq!(*sound, Some(SoundClass::Alert));
                assert_eq!(banner.as_ref().map(|b| b.title.as_str()), Some("SOS"));
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn sound_classes() {
        let mk = |kind, priority| NotificationItem::new(kind, "t", "m", priority, 0);
        assert_eq!(
            sound_class(&mk(NotificationKind::Delivery, Priority::Normal)),
            SoundClass::Delivery
        );
        assert_eq!(
            sound_class(&mk(NotificationKind::Status, Priority::Low)),
            SoundClass::Success
        );
        assert_eq!(
            sound_class(&mk(NotificationKind::Message, Priority::Emergency)),
            SoundClass::Alert
        );
        assert_eq!(
            sound_class(&mk(NotificationKind::Message, Priority::Normal)),
            SoundClass::Routine
        );
    }
}
