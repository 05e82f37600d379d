// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for the persistent bidirectional channel.

use async_trait::async_trait;

use crate::error::CourierError;

/// Opens channel links. One link is one physical connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a new link. Resolves once the transport is open, before any
    /// authentication has taken place.
    async fn open(&self) -> Result<Box<dyn TransportLink>, CourierError>;
}

/// An open text-frame link.
#[async_trait]
pub trait TransportLink: Send + 'static {
    /// Sends one text frame.
    async fn send(&mut self, frame: String) -> Result<(), CourierError>;

    /// Receives the next text frame. `None` means the peer closed the link.
    async fn recv(&mut self) -> Option<Result<String, CourierError>>;

    /// Closes the link. Errors during close are ignored.
    async fn close(&mut self);
}
