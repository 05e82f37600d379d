// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier's shared synchronization core: one ingress pipeline for channel,
//! polling and push events, optimistic sends reconciled against the
//! backend, and the presentation adapters built on top of it.

pub mod adapters;
pub mod builder;
pub mod core;
pub mod effects;
pub mod ingest;
pub mod tasks;

pub use adapters::{AdminBell, AdminInbox, DriverBell, DriverSupportChat};
pub use builder::SyncCoreBuilder;
pub use core::{SyncCore, SyncSettings, SyncUpdate};
pub use effects::{EffectDispatcher, LogEffects, NoLocation};
pub use tasks::OfflineTracker;
