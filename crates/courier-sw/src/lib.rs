// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The offline boundary in front of the app: HTTP caching strategies, the
//! worker lifecycle and control channel, and push notification handling.

pub mod cache;
pub mod http;
pub mod push;
pub mod worker;

pub use cache::{CacheStorage, NamedCache};
pub use http::{Fetcher, HttpFetcher, Request, RequestMode, Response, ResponseSource};
pub use push::{ActionKind, ClickOutcome, PlatformNotification, PushKind, PushPayload, click};
pub use worker::{ControlMessage, ControlReply, ServiceWorker, WorkerState};
