// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable local state for the Courier sync core.
//!
//! [`SqliteKv`] is the key-value store; [`OfflineCache`] puts a non-blocking
//! write-behind queue and the conversation snapshot keys on top of any
//! [`KeyValueStore`](courier_core::KeyValueStore). The dedup fingerprint set
//! is deliberately never stored here.

pub mod kv;
pub mod migrations;
pub mod offline;

pub use kv::SqliteKv;
pub use offline::{LAST_ACTIVE_KEY, OfflineCache, messages_key};
