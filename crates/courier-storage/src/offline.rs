// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-behind offline cache.
//!
//! Writes are queued to a background writer and never block the caller;
//! a full queue drops the write with a warning. Reads see queued writes
//! through an in-memory overlay, so a value is readable as soon as it is
//! set. Cached data only paints the first view; network data supersedes it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use courier_core::{ConversationSnapshot, CourierError, KeyValueStore};

pub const LAST_ACTIVE_KEY: &str = "courier:last-active-conversation";
const MESSAGES_PREFIX: &str = "courier:messages:";

pub fn messages_key(conversation_id: &str) -> String {
    format!("{MESSAGES_PREFIX}{conversation_id}")
}

enum WriteOp {
    Set { key: String, value: String },
    Remove { key: String },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct OfflineCache {
    store: Arc<dyn KeyValueStore>,
    writes: mpsc::Sender<WriteOp>,
    /// Queued values not yet written; `None` marks a queued removal.
    overlay: Arc<DashMap<String, Option<String>>>,
}

impl OfflineCache {
    /// Starts the background writer. It exits once every clone is dropped.
    pub fn spawn(store: Arc<dyn KeyValueStore>, buffer: usize) -> (Self, JoinHandle<()>) {
        let (writes, rx) = mpsc::channel(buffer.max(1));
        let overlay = Arc::new(DashMap::new());
        let task = tokio::spawn(run_writer(Arc::clone(&store), Arc::clone(&overlay), rx));
        (
            Self {
                store,
                writes,
                overlay,
            },
            task,
        )
    }

    pub fn set(&self, key: &str, value: String) {
        self.enqueue(key, Some(value));
    }

    pub fn remove(&self, key: &str) {
        self.enqueue(key, None);
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        if let Some(pending) = self.overlay.get(key) {
            return Ok(pending.value().clone());
        }
        self.store.get(key).await
    }

    /// Resolves once every write queued before the call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writes.send(WriteOp::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn save_snapshot(&self, snapshot: &ConversationSnapshot) {
        match serde_json::to_string(snapshot) {
            Ok(json) => self.set(&messages_key(&snapshot.conversation.id), json),
            Err(e) => warn!(error = %e, "snapshot not serializable, skipped"),
        }
    }

    pub async fn load_snapshot(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationSnapshot>, CourierError> {
        let Some(json) = self.get(&messages_key(conversation_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(conversation_id, error = %e, "discarding unreadable cached snapshot");
                Ok(None)
            }
        }
    }

    pub fn remove_snapshot(&self, conversation_id: &str) {
        self.remove(&messages_key(conversation_id));
    }

    pub fn set_last_active(&self, conversation_id: Option<&str>) {
        match conversation_id {
            Some(id) => self.set(LAST_ACTIVE_KEY, id.to_string()),
            None => self.remove(LAST_ACTIVE_KEY),
        }
    }

    pub async fn last_active(&self) -> Result<Option<String>, CourierError> {
        self.get(LAST_ACTIVE_KEY).await
    }

    /// Snapshot of the conversation the user last had open, if cached.
    pub async fn load_last_active(&self) -> Result<Option<ConversationSnapshot>, CourierError> {
        match self.last_active().await? {
            Some(id) => self.load_snapshot(&id).await,
            None => Ok(None),
        }
    }

    fn enqueue(&self, key: &str, value: Option<String>) {
        let op = match &value {
            Some(v) => WriteOp::Set {
                key: key.to_string(),
                value: v.clone(),
            },
            None => WriteOp::Remove {
                key: key.to_string(),
            },
        };
        let previous = self.overlay.insert(key.to_string(), value.clone());
        if let Err(e) = self.writes.try_send(op) {
            warn!(key, error = %e, "offline cache write dropped");
            match previous {
                Some(prev) => {
                    self.overlay.insert(key.to_string(), prev);
                }
                None => {
                    self.overlay.remove_if(key, |_, pending| *pending == value);
                }
            }
        }
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    overlay: Arc<DashMap<String, Option<String>>>,
    mut rx: mpsc::Receiver<WriteOp>,
) {
    while let Some(op) = rx.recv().await {
        let (key, value, result) = match op {
            WriteOp::Set { key, value } => {
                let result = store.set(&key, &value).await;
                (key, Some(value), result)
            }
            WriteOp::Remove { key } => {
                let result = store.remove(&key).await;
                (key, None, result)
            }
            WriteOp::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "offline cache write failed");
        }
        // A newer write for the same key keeps its overlay entry.
        overlay.remove_if(&key, |_, pending| *pending == value);
    }
    debug!("offline cache writer stopped");
}
