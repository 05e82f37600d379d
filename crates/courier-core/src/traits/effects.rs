// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Presentation-side receiver of side effects.

use crate::types::SideEffect;

/// Receives badge, banner, sound and offline-indicator effects.
pub trait SideEffectSink: Send + Sync + 'static {
    fn dispatch(&self, effect: SideEffect);
}
