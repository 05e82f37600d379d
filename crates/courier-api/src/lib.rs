// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator for the Courier sync core.

pub mod client;

pub use client::HttpBackend;
