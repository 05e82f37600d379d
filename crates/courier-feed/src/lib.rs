// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral notification feed behind the bell badges and dropdowns.

pub mod feed;

pub use feed::{FeedEvent, FeedSettings, NotificationFeed, RemovalReason, sound_class};
