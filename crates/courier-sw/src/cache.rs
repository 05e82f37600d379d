// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named response caches, keyed by request path.

use std::sync::Arc;

use dashmap::DashMap;

use crate::http::Response;

#[derive(Debug, Default)]
pub struct NamedCache {
    entries: DashMap<String, Response>,
}

impl NamedCache {
    pub fn get(&self, path: &str) -> Option<Response> {
        self.entries.get(path).map(|r| r.value().clone())
    }

    pub fn put(&self, path: &str, response: Response) {
        self.entries.insert(path.to_string(), response);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: DashMap<String, Arc<NamedCache>>,
}

impl CacheStorage {
    /// Returns the named cache, creating it if needed.
    pub fn open(&self, name: &str) -> Arc<NamedCache> {
        Arc::clone(self.caches.entry(name.to_string()).or_default().value())
    }

    pub fn delete(&self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Cache names, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// First hit for `path` across all caches, in name order.
    pub fn match_any(&self, path: &str) -> Option<Response> {
        self.keys()
            .iter()
            .filter_map(|name| self.caches.get(name).map(|c| Arc::clone(c.value())))
            .find_map(|cache| cache.get(path))
    }
}
