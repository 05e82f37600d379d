// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key-value store backing the offline cache.

use async_trait::async_trait;

use crate::error::CourierError;

/// String-keyed, string-valued durable store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CourierError>;

    async fn remove(&self, key: &str) -> Result<(), CourierError>;
}
