// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fingerprints identify one logical occurrence across event sources.

use std::fmt;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use courier_core::ChannelEvent;

/// Key under which an occurrence is remembered by the dedup filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Stable id when the payload has one, otherwise a content hash.
    pub fn of(event: &ChannelEvent) -> Self {
        match event.stable_id() {
            Some(id) if !id.is_empty() => Self::from_id(id),
            _ => Self::from_content(&event.body(), event.timestamp()),
        }
    }

    pub fn from_id(id: &str) -> Self {
        Self(id.to_string())
    }

    /// SHA-256 of the body and the timestamp rounded to the nearest second.
    pub fn from_content(body: &str, timestamp: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(rounded_secs(timestamp).to_be_bytes());
        Self(format!("h:{}", hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn rounded_secs(timestamp: DateTime<Utc>) -> i64 {
    (timestamp.timestamp_millis() + 500).div_euclid(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use courier_core::InboundEvent;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn stable_id_wins() {
        let raw = InboundEvent {
            name: "driver-message".into(),
            payload: serde_json::json!({"id": "m1", "message": "hello"}),
            received_at: Utc::now(),
        };
        let event = ChannelEvent::decode(&raw).unwrap();
        assert_eq!(Fingerprint::of(&event).as_str(), "m1");
    }

    #[test]
    fn near_simultaneous_bodies_collapse() {
        let a = Fingerprint::from_content("hello", at(1_700_000_000_100));
        let b = Fingerprint::from_content("hello", at(1_700_000_000_400));
        assert_eq!(a, b);
    }

    #[test]
    fn rounding_is_to_nearest_second() {
        let a = Fingerprint::from_content("x", at(1_700_000_000_499));
        let b = Fingerprint::from_content("x", at(1_700_000_000_500));
        assert_ne!(a, b);
        let c = Fingerprint::from_content("x", at(1_700_000_001_200));
        assert_eq!(b, c);
    }

    #[test]
    fn different_bodies_differ() {
        let t = at(1_700_000_000_000);
        assert_ne!(
            Fingerprint::from_content("a", t),
            Fingerprint::from_content("b", t)
        );
    }

    #[test]
    fn same_content_under_different_names_collapses() {
        let ts = "2026-03-01T10:00:00.200Z";
        let status = ChannelEvent::decode(&InboundEvent {
            name: "driver-status-changed".into(),
            payload: serde_json::json!({"driverId": "d1", "status": "online", "timestamp": ts}),
            received_at: Utc::now(),
        })
        .unwrap();
        let delivery = ChannelEvent::decode(&InboundEvent {
            name: "delivery-status-changed".into(),
            payload: serde_json::json!({"deliveryId": "d1", "status": "online", "timestamp": ts}),
            received_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(Fingerprint::of(&status), Fingerprint::of(&delivery));
    }
}
