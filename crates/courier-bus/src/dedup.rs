// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded recency filter that rejects repeats and self-echoes.
//!
//! Every inbound source (channel, polling, push) passes through the same
//! [`DedupFilter`], so one occurrence is accepted exactly once no matter how
//! many paths deliver it. The fingerprint set lives in memory only.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use courier_core::{ChannelEvent, EventSource};

use crate::fingerprint::Fingerprint;

/// Outcome of [`DedupFilter::check`]. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Fingerprint already seen within the window.
    Duplicate,
    /// Originated from the local user.
    SelfEcho,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accept
    }
}

#[derive(Debug, Clone)]
pub struct FingerprintEntry {
    pub fingerprint: Fingerprint,
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DedupFilter {
    capacity: usize,
    entries: VecDeque<FingerprintEntry>,
    seen: HashSet<Fingerprint>,
    local_user: Option<String>,
}

impl DedupFilter {
    /// `capacity` is clamped to at least 2 so half-eviction always frees room.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            local_user: None,
        }
    }

    /// Sets the user whose own actions count as self-echoes.
    pub fn set_local_user(&mut self, user_id: Option<String>) {
        self.local_user = user_id;
    }

    pub fn local_user(&self) -> Option<&str> {
        self.local_user.as_deref()
    }

    /// Decides whether `event` should take effect, recording it if so.
    ///
    /// Self-echo is checked first and never touches the cache. Typing
    /// indicators carry no lasting state and are not fingerprinted.
    pub fn check(&mut self, event: &ChannelEvent, source: EventSource) -> Verdict {
        if self.is_self_originated(event) {
            debug!(event = %event.name(), %source, "self-echo suppressed");
            return Verdict::SelfEcho;
        }
        if event.is_ephemeral() {
            return Verdict::Accept;
        }

        let fingerprint = Fingerprint::of(event);
        if self.seen.contains(&fingerprint) {
            debug!(event = %event.name(), %source, %fingerprint, "duplicate suppressed");
            return Verdict::Duplicate;
        }
        self.record(fingerprint);
        Verdict::Accept
    }

    /// Records a fingerprint produced outside the event path, such as the
    /// server id of a confirmed local send.
    pub fn remember(&mut self, fingerprint: Fingerprint) {
        if !self.seen.contains(&fingerprint) {
            self.record(fingerprint);
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets everything, e.g. on logout.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    fn is_self_originated(&self, event: &ChannelEvent) -> bool {
        if event.marked_from_self() {
            return true;
        }
        matches!(
            (event.actor_id(), self.local_user.as_deref()),
            (Some(actor), Some(me)) if actor == me
        )
    }

    fn record(&mut self, fingerprint: Fingerprint) {
        if self.entries.len() >= self.capacity {
            let evict = self.entries.len() / 2;
            for entry in self.entries.drain(..evict) {
                self.seen.remove(&entry.fingerprint);
            }
            trace!(evicted = evict, "dedup cache halved");
        }
        self.seen.insert(fingerprint.clone());
        self.entries.push_back(FingerprintEntry {
            fingerprint,
            seen_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::InboundEvent;

    fn event(name: &str, payload: serde_json::Value) -> ChannelEvent {
        ChannelEvent::decode(&InboundEvent {
            name: name.into(),
            payload,
            received_at: Utc::now(),
        })
        .unwrap()
    }

    fn msg(id: &str) -> ChannelEvent {
        event(
            "driver-message",
            serde_json::json!({"id": id, "message": "hello", "senderId": "d1"}),
        )
    }

    #[test]
    fn second_delivery_is_duplicate() {
        let mut filter = DedupFilter::new(100);
        assert_eq!(filter.check(&msg("m1"), EventSource::Channel), Verdict::Accept);
        assert_eq!(filter.check(&msg("m1"), EventSource::Polling), Verdict::Duplicate);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn actor_matching_local_user_is_self_echo() {
        let mut filter = DedupFilter::new(100);
        filter.set_local_user(Some("d1".into()));
        assert_eq!(filter.check(&msg("m1"), EventSource::Channel), Verdict::SelfEcho);
        assert!(filter.is_empty(), "self-echo must not be recorded");
    }

    #[test]
    fn explicit_marker_is_self_echo_without_identity() {
        let mut filter = DedupFilter::new(100);
        let ev = event(
            "admin-message",
            serde_json::json!({"id": "a1", "message": "ok", "isFromSender": true}),
        );
        assert_eq!(filter.check(&ev, EventSource::Channel), Verdict::SelfEcho);
    }

    #[test]
    fn overflow_evicts_older_half() {
        let mut filter = DedupFilter::new(4);
        for i in 0..4 {
            filter.check(&msg(&format!("m{i}")), EventSource::Channel);
        }
        assert_eq!(filter.len(), 4);
        filter.check(&msg("m4"), EventSource::Channel);
        assert_eq!(filter.len(), 3);
        assert!(!filter.contains(&Fingerprint::from_id("m0")));
        assert!(!filter.contains(&Fingerprint::from_id("m1")));
        assert!(filter.contains(&Fingerprint::from_id("m2")));
        assert!(filter.contains(&Fingerprint::from_id("m4")));
    }

    #[test]
    fn typing_is_never_fingerprinted() {
        let mut filter = DedupFilter::new(10);
        let typing = event("driver-typing", serde_json::json!({"senderId": "d1"}));
        assert!(filter.check(&typing, EventSource::Channel).is_accepted());
        assert!(filter.check(&typing, EventSource::Channel).is_accepted());
        assert!(filter.is_empty());
    }

    #[test]
    fn remembered_server_id_blocks_later_echo() {
        let mut filter = DedupFilter::new(10);
        filter.remember(Fingerprint::from_id("srv-9"));
        let echo = event(
            "admin-message",
            serde_json::json!({"id": "srv-9", "message": "hi"}),
        );
        assert_eq!(filter.check(&echo, EventSource::Channel), Verdict::Duplicate);
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(DedupFilter::new(0).capacity(), 2);
    }
}
