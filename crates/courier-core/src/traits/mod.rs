// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams of the sync core.
//!
//! Network-facing traits use `#[async_trait]` for dynamic dispatch; the
//! presentation-facing sinks are synchronous and must not block.

pub mod audio;
pub mod backend;
pub mod effects;
pub mod kv;
pub mod location;
pub mod transport;

pub use audio::AudioSink;
pub use backend::BackendApi;
pub use effects::SideEffectSink;
pub use kv::KeyValueStore;
pub use location::LocationProvider;
pub use transport::{Transport, TransportLink};
