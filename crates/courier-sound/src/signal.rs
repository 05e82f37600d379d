// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plays tone sequences on an [`AudioSink`].
//!
//! The sink is initialized on the first play. An init failure disables sound
//! for the rest of the process and is logged once; it is never surfaced to
//! the caller.

use std::sync::{Arc, OnceLock};

use tracing::{debug, trace, warn};

use courier_config::model::SoundConfig;
use courier_core::{AudioSink, CourierError, SoundClass};

use crate::tones::{synthesize, tones};

pub struct SoundSignal {
    sink: Arc<dyn AudioSink>,
    enabled: bool,
    sample_rate: u32,
    ready: OnceLock<bool>,
}

impl SoundSignal {
    pub fn new(sink: Arc<dyn AudioSink>, config: &SoundConfig) -> Self {
        Self {
            sink,
            enabled: config.enabled,
            sample_rate: config.sample_rate,
            ready: OnceLock::new(),
        }
    }

    /// Plays the cue for `class`. Returns whether audio was handed to the sink.
    pub fn play(&self, class: SoundClass) -> bool {
        if !self.enabled || !self.ensure_ready() {
            return false;
        }
        let pcm = synthesize(tones(class), self.sample_rate);
        match self.sink.play(&pcm, self.sample_rate) {
            Ok(()) => {
                trace!(%class, samples = pcm.len(), "cue played");
                true
            }
            Err(e) => {
                debug!(%class, error = %e, "cue dropped");
                false
            }
        }
    }

    /// Whether the sink initialized; `None` before the first play.
    pub fn is_available(&self) -> Option<bool> {
        self.ready.get().copied()
    }

    fn ensure_ready(&self) -> bool {
        *self.ready.get_or_init(|| match self.sink.init() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "audio unavailable, alerts will be silent");
                false
            }
        })
    }
}

/// Sink for headless runs: accepts every cue and discards it.
#[derive(Debug, Default)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn init(&self) -> Result<(), CourierError> {
        Ok(())
    }

    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), CourierError> {
        trace!(samples = samples.len(), sample_rate, "discarding cue");
        Ok(())
    }
}
