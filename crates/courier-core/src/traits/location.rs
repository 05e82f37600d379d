// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device geolocation, used to tag emergency messages.

use async_trait::async_trait;

use crate::types::GeoPoint;

#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Current position, or `None` when unavailable or denied.
    async fn current_location(&self) -> Option<GeoPoint>;
}
