// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use courier_api::HttpBackend;
use courier_bus::{DedupFilter, EventRouter};
use courier_config::CourierConfig;
use courier_connection::{ConnectionManager, ConnectionSettings, WsTransport};
use courier_conversation::{ConversationStore, PersistScheduler};
use courier_core::{
    AudioSink, BackendApi, CourierError, Identity, KeyValueStore, LocationProvider,
    SideEffectSink, Transport,
};
use courier_feed::{FeedSettings, NotificationFeed};
use courier_sound::{SilentSink, SoundSignal};
use courier_storage::OfflineCache;

use crate::core::{Inner, SyncCore, SyncSettings};
use crate::effects::{EffectDispatcher, LogEffects, NoLocation};

/// Assembles a [`SyncCore`] from configuration plus collaborators.
///
/// Only the key-value store is required. The transport and backend default
/// to the WebSocket and HTTP implementations at the configured URLs; audio,
/// location and presentation default to headless stand-ins.
pub struct SyncCoreBuilder {
    identity: Identity,
    config: CourierConfig,
    transport: Option<Arc<dyn Transport>>,
    backend: Option<Arc<dyn BackendApi>>,
    store: Option<Arc<dyn KeyValueStore>>,
    audio: Option<Arc<dyn AudioSink>>,
    location: Option<Arc<dyn LocationProvider>>,
    presentation: Option<Arc<dyn SideEffectSink>>,
}

impl SyncCoreBuilder {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            config: CourierConfig::default(),
            transport: None,
            backend: None,
            store: None,
            audio: None,
            location: None,
            presentation: None,
        }
    }

    pub fn config(mut self, config: CourierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn BackendApi>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn audio(mut self, audio: Arc<dyn AudioSink>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn presentation(mut self, sink: Arc<dyn SideEffectSink>) -> Self {
        self.presentation = Some(sink);
        self
    }

    /// Builds the core. Spawns the cache writer and persistence tasks, so
    /// this must run inside a tokio runtime.
    pub fn build(self) -> Result<SyncCore, CourierError> {
        let config = self.config;
        let store = self.store.ok_or_else(|| {
            CourierError::Config("a key-value store is required for the offline cache".into())
        })?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WsTransport::new(config.connection.url.clone())),
        };
        let backend = match self.backend {
            Some(backend) => backend,
            None => {
                let mut http = HttpBackend::new(&config.backend)?;
                if let Some(token) = &self.identity.token {
                    http = http.with_token(token.clone());
                }
                Arc::new(http)
            }
        };

        let sound = SoundSignal::new(
            self.audio.unwrap_or_else(|| Arc::new(SilentSink)),
            &config.sound,
        );
        let presentation = self.presentation.unwrap_or_else(|| Arc::new(LogEffects));
        let effects: Arc<dyn SideEffectSink> = Arc::new(EffectDispatcher::new(sound, presentation));

        let (connection, inbound) =
            ConnectionManager::new(transport, ConnectionSettings::from(&config.connection));
        let (cache, _writer) = OfflineCache::spawn(store, config.cache.write_buffer);
        let (persist, _persister) = PersistScheduler::spawn(
            cache.clone(),
            Duration::from_millis(config.conversations.persist_debounce_ms),
        );

        let mut dedup = DedupFilter::new(config.dedup.capacity);
        dedup.set_local_user(Some(self.identity.user_id.clone()));

        let (updates, _) = broadcast::channel(128);
        let feed = NotificationFeed::new(
            FeedSettings::from(&config.notifications),
            Arc::clone(&effects),
        );
        let settings = SyncSettings::from(&config);
        debug!(?settings, "sync core assembled");

        Ok(SyncCore::from_inner(Arc::new(Inner {
            identity: self.identity,
            settings,
            connection,
            inbound: Mutex::new(Some(inbound)),
            backend,
            router: EventRouter::new(),
            dedup: Mutex::new(dedup),
            store: Mutex::new(ConversationStore::new()),
            feed,
            cache,
            persist,
            effects,
            location: self.location.unwrap_or_else(|| Arc::new(NoLocation)),
            updates,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })))
    }
}

impl SyncCore {
    pub fn builder(identity: Identity) -> SyncCoreBuilder {
        SyncCoreBuilder::new(identity)
    }
}
