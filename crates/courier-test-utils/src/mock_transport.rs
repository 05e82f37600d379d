// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable in-process channel transport.
//!
//! Each `open()` consumes the next [`LinkBehavior`] from the script (or the
//! default once the script is empty). Accepted links answer the auth frame
//! themselves, record every frame the client sends, and receive whatever the
//! test pushes through [`MockTransport::push_event`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use courier_core::{CourierError, Transport, TransportLink};

/// How one link attempt behaves.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkBehavior {
    /// Open succeeds and auth is acknowledged.
    Accept,
    /// Open succeeds, auth is answered with `auth-error`.
    RejectAuth(String),
    /// Open itself fails.
    FailOpen,
    /// Open never resolves until [`MockTransport::release`] is called.
    Hang,
    /// Open succeeds but auth is never answered.
    Silent,
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<String>>,
    server_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

pub struct MockTransport {
    opens: AtomicUsize,
    script: Mutex<VecDeque<LinkBehavior>>,
    default: LinkBehavior,
    gate: Notify,
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Every open is accepted.
    pub fn new() -> Self {
        Self::with_default(LinkBehavior::Accept)
    }

    pub fn with_default(default: LinkBehavior) -> Self {
        Self {
            opens: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            default,
            gate: Notify::new(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Queues behaviours for the next opens, in order.
    pub fn script(self, behaviors: impl IntoIterator<Item = LinkBehavior>) -> Self {
        self.script.lock().unwrap().extend(behaviors);
        self
    }

    /// Number of `open()` calls so far, including hanging ones.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Lets every hanging open proceed as `Accept`.
    pub fn release(&self) {
        self.gate.notify_waiters();
    }

    /// Frames the client sent, in order, across all links.
    pub fn sent_frames(&self) -> Vec<String> {
        self.shared.sent.lock().unwrap().clone()
    }

    /// Sent frames whose `event` field equals `name`.
    pub fn sent_events(&self, name: &str) -> Vec<serde_json::Value> {
        self.sent_frames()
            .iter()
            .filter_map(|f| serde_json::from_str::<serde_json::Value>(f).ok())
            .filter(|v| v["event"] == name)
            .collect()
    }

    /// Delivers an application event over the current link.
    pub fn push_event(&self, name: &str, data: serde_json::Value) -> bool {
        let frame = serde_json::json!({ "event": name, "data": data }).to_string();
        self.push_raw(frame)
    }

    pub fn push_raw(&self, frame: String) -> bool {
        self.shared
            .server_tx
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// Closes the current link from the server side.
    pub fn drop_link(&self) {
        self.shared.server_tx.lock().unwrap().take();
    }

    fn next_behavior(&self) -> LinkBehavior {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }

    fn link(&self, answer: Option<String>) -> Box<dyn TransportLink> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.server_tx.lock().unwrap() = Some(tx);
        Box::new(MockLink {
            shared: Arc::clone(&self.shared),
            rx,
            auth_answer: answer,
        })
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> Result<Box<dyn TransportLink>, CourierError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match self.next_behavior() {
            LinkBehavior::Accept => Ok(self.link(Some(auth_ok()))),
            LinkBehavior::RejectAuth(reason) => Ok(self.link(Some(
                serde_json::json!({"event": "auth-error", "data": {"reason": reason}}).to_string(),
            ))),
            LinkBehavior::FailOpen => Err(CourierError::transport("connection refused")),
            LinkBehavior::Hang => {
                self.gate.notified().await;
                Ok(self.link(Some(auth_ok())))
            }
            LinkBehavior::Silent => Ok(self.link(None)),
        }
    }
}

fn auth_ok() -> String {
    serde_json::json!({"event": "auth-ok", "data": {}}).to_string()
}

struct MockLink {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<String>,
    auth_answer: Option<String>,
}

#[async_trait]
impl TransportLink for MockLink {
    async fn send(&mut self, frame: String) -> Result<(), CourierError> {
        let is_auth = serde_json::from_str::<serde_json::Value>(&frame)
            .map(|v| v["event"] == "auth")
            .unwrap_or(false);
        self.shared.sent.lock().unwrap().push(frame);
        if is_auth && let Some(answer) = self.auth_answer.take() {
            let tx = self.shared.server_tx.lock().unwrap().clone();
            if let Some(tx) = tx {
                let _ = tx.send(answer);
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, CourierError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
