// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end sync scenarios.
//!
//! `TestHarness` assembles a [`SyncCore`] over mock collaborators: a
//! scriptable channel, an in-memory backend and key-value store, and
//! recording audio and presentation sinks. Reconnect delays are shortened
//! and the history poller is off unless a test turns it on.

use std::sync::Arc;
use std::time::Duration;

use courier_config::CourierConfig;
use courier_core::{CourierError, Identity, Role};
use courier_sync::SyncCore;
use tracing::debug;

use crate::mock_backend::MockBackend;
use crate::mock_transport::MockTransport;
use crate::recorders::{MemoryKv, MockLocation, RecordingAudio, RecordingEffects};

/// How long [`TestHarness::eventually`] waits before giving up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    identity: Identity,
    config: CourierConfig,
    transport: Option<MockTransport>,
    backend: Option<MockBackend>,
    kv: Option<Arc<MemoryKv>>,
    audio: Option<RecordingAudio>,
    location: MockLocation,
}

impl TestHarnessBuilder {
    fn new(identity: Identity) -> Self {
        let mut config = CourierConfig::default();
        config.connection.reconnect_base_delay_ms = 10;
        config.connection.reconnect_max_delay_ms = 40;
        config.connection.handshake_timeout_ms = 500;
        config.conversations.persist_debounce_ms = 50;
        config.polling.enabled = false;
        Self {
            identity,
            config,
            transport: None,
            backend: None,
            kv: None,
            audio: None,
            location: MockLocation::none(),
        }
    }

    /// Adjusts the configuration the core is built with.
    pub fn with_config(mut self, edit: impl FnOnce(&mut CourierConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn with_transport(mut self, transport: MockTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_backend(mut self, backend: MockBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Reuses a store, e.g. one left behind by an earlier harness.
    pub fn with_kv(mut self, kv: Arc<MemoryKv>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_audio(mut self, audio: RecordingAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_location(mut self, location: MockLocation) -> Self {
        self.location = location;
        self
    }

    /// Builds the core without starting it. Must run inside a runtime.
    pub fn build(self) -> Result<TestHarness, CourierError> {
        let transport = Arc::new(self.transport.unwrap_or_default());
        let backend = Arc::new(
            self.backend
                .unwrap_or_else(|| MockBackend::new(self.identity.user_id.clone())),
        );
        let kv = self.kv.unwrap_or_default();
        let audio = Arc::new(self.audio.unwrap_or_default());
        let effects = Arc::new(RecordingEffects::new());
        debug!(
            user = %self.identity.user_id,
            role = %self.identity.role,
            "building test harness"
        );

        let core = SyncCore::builder(self.identity)
            .config(self.config.clone())
            .transport(transport.clone())
            .backend(backend.clone())
            .store(kv.clone())
            .audio(audio.clone())
            .location(Arc::new(self.location))
            .presentation(effects.clone())
            .build()?;

        Ok(TestHarness {
            core,
            transport,
            backend,
            kv,
            audio,
            effects,
            config: self.config,
        })
    }
}

/// A sync core wired to mocks, with handles to every mock for assertions.
pub struct TestHarness {
    pub core: SyncCore,
    pub transport: Arc<MockTransport>,
    pub backend: Arc<MockBackend>,
    pub kv: Arc<MemoryKv>,
    pub audio: Arc<RecordingAudio>,
    pub effects: Arc<RecordingEffects>,
    pub config: CourierConfig,
}

impl TestHarness {
    pub fn admin(user_id: &str) -> TestHarnessBuilder {
        TestHarnessBuilder::new(Identity::new(user_id, Role::Admin).with_token("test-token"))
    }

    pub fn driver(user_id: &str) -> TestHarnessBuilder {
        TestHarnessBuilder::new(Identity::new(user_id, Role::Driver).with_token("test-token"))
    }

    /// Starts the core and waits until the channel is authenticated.
    pub async fn start_online(&self) -> Result<(), CourierError> {
        self.core.start().await?;
        if !self.eventually(|| self.core.channel().is_authenticated()).await {
            return Err(CourierError::Timeout {
                duration: SETTLE_TIMEOUT,
            });
        }
        Ok(())
    }

    /// Pushes an event over the mock channel and waits until the core has
    /// taken it off the inbound queue.
    pub async fn deliver(&self, name: &str, data: serde_json::Value) -> bool {
        if !self.transport.push_event(name, data) {
            return false;
        }
        self.settle().await;
        true
    }

    /// Lets spawned tasks run.
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    /// Polls `check` until it holds or the settle timeout elapses.
    pub async fn eventually(&self, check: impl Fn() -> bool) -> bool {
        poll_until(check, SETTLE_TIMEOUT).await
    }

    pub async fn shutdown(&self) {
        self.core.shutdown().await;
    }
}

async fn poll_until(check: impl Fn() -> bool, timeout: Duration) -> bool {
    let wait = async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(timeout, wait).await.is_ok()
}
