// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state for the Courier sync core.
//!
//! [`ConversationStore`] holds the working set of open conversations and their
//! message logs, including optimistic sends and their reconciliation.
//! [`PersistScheduler`] mirrors snapshots into the offline cache.

pub mod persist;
pub mod store;

pub use persist::PersistScheduler;
pub use store::{ConversationStore, InboundOutcome, IncomingMessage, StatusChange};
