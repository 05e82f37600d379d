// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event routing and deduplication shared by every inbound source.
//!
//! [`DedupFilter`] decides whether an occurrence takes effect; [`EventRouter`]
//! fans accepted events out to presentation subscribers.

pub mod dedup;
pub mod fingerprint;
pub mod router;

pub use dedup::{DedupFilter, FingerprintEntry, Verdict};
pub use fingerprint::Fingerprint;
pub use router::{EventRouter, Handler, SubscriptionToken};
