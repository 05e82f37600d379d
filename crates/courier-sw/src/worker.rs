// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker lifecycle and fetch interception.
//!
//! Strategies by request class:
//! - static assets: cache first, then network (populating the static cache);
//! - API calls: network first (populating the dynamic cache), then the last
//!   cached response, then a structured offline payload;
//! - navigations: network, then the offline page, then the app shell.
//!
//! No path through [`ServiceWorker::handle_fetch`] returns an error.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info, warn};

use courier_config::model::ServiceWorkerConfig;
use courier_core::CourierError;

use crate::cache::CacheStorage;
use crate::http::{Fetcher, Request, RequestMode, Response};

const CACHE_PREFIX: &str = "courier-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker will never control a page.
    Redundant,
}

/// Messages a page can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    Version { version: String },
}

pub struct ServiceWorker {
    config: ServiceWorkerConfig,
    fetcher: Arc<dyn Fetcher>,
    caches: CacheStorage,
    state: Mutex<WorkerState>,
}

impl ServiceWorker {
    pub fn new(config: ServiceWorkerConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            caches: CacheStorage::default(),
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn static_cache_name(&self) -> String {
        format!("{CACHE_PREFIX}static-{}", self.config.version)
    }

    pub fn dynamic_cache_name(&self) -> String {
        format!("{CACHE_PREFIX}dynamic-{}", self.config.version)
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    /// Precaches every static asset. Any failure fails the whole install.
    pub async fn install(&self) -> Result<(), CourierError> {
        self.set_state(WorkerState::Installing);
        let cache = self.caches.open(&self.static_cache_name());

        for path in &self.config.static_assets {
            let fetched = self.fetcher.fetch(&Request::get(path.as_str())).await;
            match fetched {
                Ok(response) if response.is_success() => cache.put(path, response),
                Ok(response) => {
                    self.set_state(WorkerState::Redundant);
                    return Err(CourierError::backend(
                        Some(response.status),
                        format!("precache of {path} returned {}", response.status),
                    ));
                }
                Err(e) => {
                    self.set_state(WorkerState::Redundant);
                    warn!(path = %path, error = %e, "precache failed");
                    return Err(e);
                }
            }
        }

        self.set_state(WorkerState::Installed);
        info!(version = %self.config.version, assets = cache.len(), "service worker installed");
        Ok(())
    }

    /// Takes control and deletes caches left by other versions.
    /// Returns the names of the deleted caches.
    pub fn activate(&self) -> Vec<String> {
        self.set_state(WorkerState::Activating);
        let keep = [self.static_cache_name(), self.dynamic_cache_name()];
        let stale: Vec<String> = self
            .caches
            .keys()
            .into_iter()
            .filter(|name| name.starts_with(CACHE_PREFIX) && !keep.contains(name))
            .collect();
        for name in &stale {
            self.caches.delete(name);
        }
        self.set_state(WorkerState::Activated);
        info!(version = %self.config.version, purged = stale.len(), "service worker activated");
        stale
    }

    pub fn handle_message(&self, message: ControlMessage) -> Option<ControlReply> {
        match message {
            ControlMessage::SkipWaiting => {
                if self.state() == WorkerState::Installed {
                    self.activate();
                } else {
                    debug!(state = %self.state(), "skip-waiting ignored");
                }
                None
            }
            ControlMessage::GetVersion => Some(ControlReply::Version {
                version: self.config.version.clone(),
            }),
        }
    }

    /// Parses and handles a raw control message. Unknown messages are ignored.
    pub fn handle_raw_message(&self, raw: &serde_json::Value) -> Option<ControlReply> {
        match serde_json::from_value::<ControlMessage>(raw.clone()) {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                debug!(error = %e, "ignoring unknown control message");
                None
            }
        }
    }

    pub async fn handle_fetch(&self, request: &Request) -> Response {
        if self.state() != WorkerState::Activated || !request.is_get() {
            return self.passthrough(request).await;
        }
        if request.mode == RequestMode::Navigate {
            return self.navigate(request).await;
        }
        if request.path.starts_with(&self.config.api_prefix) {
            return self.network_first(request).await;
        }
        self.cache_first(request).await
    }

    async fn passthrough(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(path = %request.path, error = %e, "network unavailable");
                Response::offline(&request.path, "network unavailable")
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Response {
        let cache = self.caches.open(&self.static_cache_name());
        if let Some(hit) = cache.get(&request.path) {
            return hit.from_cache();
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    cache.put(&request.path, response.clone());
                }
                response
            }
            Err(e) => {
                debug!(path = %request.path, error = %e, "static asset unavailable");
                Response::offline(&request.path, "resource unavailable offline")
            }
        }
    }

    async fn network_first(&self, request: &Request) -> Response {
        let cache = self.caches.open(&self.dynamic_cache_name());
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    cache.put(&request.path, response.clone());
                }
                response
            }
            Err(e) => {
                debug!(path = %request.path, error = %e, "api unreachable, trying cache");
                match cache.get(&request.path) {
                    Some(hit) => hit.from_cache(),
                    None => Response::offline(
                        &request.path,
                        "You are offline and this data has not been cached",
                    ),
                }
            }
        }
    }

    async fn navigate(&self, request: &Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => return response,
            Err(e) => debug!(path = %request.path, error = %e, "navigation offline"),
        }
        [&self.config.offline_page, &self.config.shell_path]
            .into_iter()
            .find_map(|path| self.caches.match_any(path))
            .map(Response::from_cache)
            .unwrap_or_else(|| Response::offline(&request.path, "page unavailable offline"))
    }
}
