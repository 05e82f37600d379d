// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audio output device.

use crate::error::CourierError;

/// Plays synthesized PCM. Implementations must return promptly.
pub trait AudioSink: Send + Sync + 'static {
    /// Prepares the device. Called once, lazily, before the first play.
    fn init(&self) -> Result<(), CourierError>;

    /// Queues mono f32 samples at the given rate.
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), CourierError>;
}
