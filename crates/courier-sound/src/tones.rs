// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed tone sequences and their PCM rendering.

use std::f32::consts::TAU;

use courier_core::SoundClass;

/// One sine tone followed by silence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub freq_hz: f32,
    pub duration_ms: u32,
    pub gap_ms: u32,
    pub gain: f32,
}

const fn tone(freq_hz: f32, duration_ms: u32, gap_ms: u32, gain: f32) -> Tone {
    Tone {
        freq_hz,
        duration_ms,
        gap_ms,
        gain,
    }
}

const ROUTINE: &[Tone] = &[tone(880.0, 90, 0, 0.25)];

const SUCCESS: &[Tone] = &[tone(660.0, 80, 30, 0.3), tone(990.0, 120, 0, 0.3)];

const ALERT: &[Tone] = &[
    tone(1046.5, 150, 60, 0.5),
    tone(784.0, 150, 60, 0.5),
    tone(1046.5, 150, 60, 0.5),
    tone(784.0, 250, 0, 0.5),
];

const DELIVERY: &[Tone] = &[
    tone(523.25, 100, 40, 0.35),
    tone(659.25, 100, 40, 0.35),
    tone(783.99, 180, 0, 0.35),
];

pub fn tones(class: SoundClass) -> &'static [Tone] {
    match class {
        SoundClass::Routine => ROUTINE,
        SoundClass::Success => SUCCESS,
        SoundClass::Alert => ALERT,
        SoundClass::Delivery => DELIVERY,
    }
}

/// Ramp length at each tone edge, to avoid clicks.
const RAMP_MS: u32 = 5;

fn samples_for(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}

/// Renders a sequence to mono f32 samples in `[-1, 1]`.
pub fn synthesize(sequence: &[Tone], sample_rate: u32) -> Vec<f32> {
    let total: usize = sequence
        .iter()
        .map(|t| samples_for(t.duration_ms + t.gap_ms, sample_rate))
        .sum();
    let mut out = Vec::with_capacity(total);
    let rate = sample_rate as f32;

    for t in sequence {
        let n = samples_for(t.duration_ms, sample_rate);
        let ramp = samples_for(RAMP_MS, sample_rate).min(n / 2).max(1);
        for i in 0..n {
            let edge = i.min(n - 1 - i);
            let envelope = (edge as f32 / ramp as f32).min(1.0);
            let phase = TAU * t.freq_hz * i as f32 / rate;
            out.push(phase.sin() * t.gain * envelope);
        }
        out.resize(out.len() + samples_for(t.gap_ms, sample_rate), 0.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SoundClass; 4] = [
        SoundClass::Routine,
        SoundClass::Success,
        SoundClass::Alert,
        SoundClass::Delivery,
    ];

    #[test]
    fn every_class_has_a_distinct_sequence() {
        for (i, a) in ALL.iter().enumerate() {
            assert!(!tones(*a).is_empty());
            for b in &ALL[i + 1..] {
                assert_ne!(tones(*a), tones(*b));
            }
        }
    }

    #[test]
    fn synthesis_is_deterministic_and_sized() {
        let a = synthesize(tones(SoundClass::Success), 8000);
        let b = synthesize(tones(SoundClass::Success), 8000);
        assert_eq!(a, b);
        // 80 + 30 + 120 ms at 8 kHz.
        assert_eq!(a.len(), 640 + 240 + 960);
        assert!(a.iter().all(|s| s.abs() <= 1.0));
        assert!(a[640..880].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn tone_edges_start_silent() {
        let pcm = synthesize(tones(SoundClass::Alert), 44_100);
        assert_eq!(pcm[0], 0.0);
        assert!(pcm.iter().any(|s| s.abs() > 0.4));
    }
}
