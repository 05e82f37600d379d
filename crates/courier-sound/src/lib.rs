// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audio cues for alert classes.

pub mod signal;
pub mod tones;

pub use signal::{SilentSink, SoundSignal};
pub use tones::{Tone, synthesize, tones};
