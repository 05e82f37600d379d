// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent channel lifecycle for the Courier sync core.

pub mod backoff;
pub mod codec;
pub mod manager;
pub mod ws;

pub use backoff::Backoff;
pub use manager::{ConnectionManager, ConnectionSettings};
pub use ws::WsTransport;
