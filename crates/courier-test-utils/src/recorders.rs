// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording and in-memory collaborators.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use courier_core::types::GeoPoint;
use courier_core::{
    AudioSink, CourierError, KeyValueStore, LocationProvider, SideEffect, SideEffectSink,
};

/// Key-value store backed by a `HashMap`. Share one `Arc` across harness
/// rebuilds to simulate an app restart.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CourierError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CourierError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Presentation sink that keeps every effect it is handed.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    effects: Mutex<Vec<SideEffect>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<SideEffect> {
        self.effects.lock().unwrap().clone()
    }

    /// Item ids of every alert, in dispatch order.
    pub fn alerts(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                SideEffect::Alert { item_id, .. } => Some(item_id),
                SideEffect::OfflineIndicator { .. } => None,
            })
            .collect()
    }

    /// Offline indicator transitions, in dispatch order.
    pub fn offline_changes(&self) -> Vec<bool> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                SideEffect::OfflineIndicator { visible } => Some(visible),
                SideEffect::Alert { .. } => None,
            })
            .collect()
    }
}

impl SideEffectSink for RecordingEffects {
    fn dispatch(&self, effect: SideEffect) {
        self.effects.lock().unwrap().push(effect);
    }
}

/// Audio sink that counts init attempts and played cues.
#[derive(Debug, Default)]
pub struct RecordingAudio {
    unavailable: AtomicBool,
    inits: AtomicUsize,
    plays: AtomicUsize,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device whose initialization always fails.
    pub fn unavailable() -> Self {
        let audio = Self::default();
        audio.unavailable.store(true, Ordering::SeqCst);
        audio
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

impl AudioSink for RecordingAudio {
    fn init(&self) -> Result<(), CourierError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CourierError::Internal("no audio device".into()));
        }
        Ok(())
    }

    fn play(&self, _samples: &[f32], _sample_rate: u32) -> Result<(), CourierError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Location provider answering with a fixed point, after an optional delay.
#[derive(Debug, Clone, Default)]
pub struct MockLocation {
    point: Option<GeoPoint>,
    delay: Option<Duration>,
    hang: bool,
}

impl MockLocation {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            point: Some(GeoPoint {
                lat,
                lng,
                accuracy_m: Some(10.0),
            }),
            ..Self::default()
        }
    }

    /// Permission denied or no fix.
    pub fn none() -> Self {
        Self::default()
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn current_location(&self) -> Option<GeoPoint> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.point
    }
}
