// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Side-effect plumbing between the core and the presentation layer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use courier_core::types::GeoPoint;
use courier_core::{LocationProvider, SideEffect, SideEffectSink};
use courier_sound::SoundSignal;

/// Plays the alert cue, then hands the effect to the presentation sink.
pub struct EffectDispatcher {
    sound: SoundSignal,
    downstream: Arc<dyn SideEffectSink>,
}

impl EffectDispatcher {
    pub fn new(sound: SoundSignal, downstream: Arc<dyn SideEffectSink>) -> Self {
        Self { sound, downstream }
    }
}

impl SideEffectSink for EffectDispatcher {
    fn dispatch(&self, effect: SideEffect) {
        if let SideEffect::Alert {
            sound: Some(class), ..
        } = &effect
        {
            self.sound.play(*class);
        }
        self.downstream.dispatch(effect);
    }
}

/// Presentation sink for headless runs: every effect becomes a log line.
#[derive(Debug, Default)]
pub struct LogEffects;

impl SideEffectSink for LogEffects {
    fn dispatch(&self, effect: SideEffect) {
        match effect {
            SideEffect::Alert {
                item_id, banner, ..
            } => match banner {
                Some(b) => {
                    info!(%item_id, title = %b.title, priority = %b.priority, "{}", b.message)
                }
                None => info!(%item_id, "quiet alert"),
            },
            SideEffect::OfflineIndicator { visible: true } => info!("offline: reconnecting"),
            SideEffect::OfflineIndicator { visible: false } => info!("back online"),
        }
    }
}

/// Location source for hosts without geolocation.
#[derive(Debug, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn current_location(&self) -> Option<GeoPoint> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use courier_config::model::SoundConfig;
    use courier_core::types::Banner;
    use courier_core::{AudioSink, CourierError, Priority, SoundClass};

    use super::*;

    #[derive(Default)]
    struct CountingAudio(AtomicUsize);

    impl AudioSink for CountingAudio {
        fn init(&self) -> Result<(), CourierError> {
            Ok(())
        }

        fn play(&self, _: &[f32], _: u32) -> Result<(), CourierError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<SideEffect>>);

    impl SideEffectSink for Collect {
        fn dispatch(&self, effect: SideEffect) {
            self.0.lock().unwrap().push(effect);
        }
    }

    fn alert(sound: Option<SoundClass>) -> SideEffect {
        SideEffect::Alert {
            item_id: "n1".into(),
            sound,
            banner: Some(Banner {
                title: "Delivery".into(),
                message: "GX123".into(),
                priority: Priority::High,
            }),
        }
    }

    #[test]
    fn plays_the_cue_then_forwards() {
        let audio = Arc::new(CountingAudio::default());
        let downstream = Arc::new(Collect::default());
        let dispatcher = EffectDispatcher::new(
            SoundSignal::new(audio.clone(), &SoundConfig::default()),
            downstream.clone(),
        );

        dispatcher.dispatch(alert(Some(SoundClass::Delivery)));
        dispatcher.dispatch(alert(None));
        dispatcher.dispatch(SideEffect::OfflineIndicator { visible: true });

        assert_eq!(audio.0.load(Ordering::SeqCst), 1);
        assert_eq!(downstream.0.lock().unwrap().len(), 3);
    }

    #[test]
    #[tracing_test::traced_test]
    fn log_effects_report_offline_edges() {
        LogEffects.dispatch(SideEffect::OfflineIndicator { visible: true });
        LogEffects.dispatch(SideEffect::OfflineIndicator { visible: false });
        assert!(logs_contain("offline: reconnecting"));
        assert!(logs_contain("back online"));
    }

    #[tokio::test]
    async fn no_location_answers_none() {
        assert!(NoLocation.current_location().await.is_none());
    }
}
