// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides scriptable stand-ins for every collaborator the sync core talks
//! to, and a [`TestHarness`] that wires them into a running core.

pub mod harness;
pub mod mock_backend;
pub mod mock_transport;
pub mod recorders;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_backend::{Failure, MockBackend, remote_message};
pub use mock_transport::{LinkBehavior, MockTransport};
pub use recorders::{MemoryKv, MockLocation, RecordingAudio, RecordingEffects};
