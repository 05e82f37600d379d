// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced persistence of conversation snapshots.
//!
//! Mutations schedule a write; writes for the same conversation within the
//! debounce window coalesce into the latest snapshot. The task flushes what
//! it holds when every [`PersistScheduler`] handle is dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use courier_core::ConversationSnapshot;
use courier_storage::OfflineCache;

#[derive(Debug)]
enum PersistOp {
    Snapshot(Box<ConversationSnapshot>),
    Remove(String),
    Active(Option<String>),
    Flush(tokio::sync::oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct PersistScheduler {
    tx: mpsc::UnboundedSender<PersistOp>,
}

#[derive(Default)]
struct Pending {
    snapshots: HashMap<String, Option<ConversationSnapshot>>,
    active: Option<Option<String>>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.active.is_none()
    }

    fn write(&mut self, cache: &OfflineCache) {
        let count = self.snapshots.len();
        for (id, snapshot) in self.snapshots.drain() {
            match snapshot {
                Some(snapshot) => cache.save_snapshot(&snapshot),
                None => cache.remove_snapshot(&id),
            }
        }
        if let Some(active) = self.active.take() {
            cache.set_last_active(active.as_deref());
        }
        debug!(conversations = count, "conversation state persisted");
    }
}

impl PersistScheduler {
    pub fn spawn(cache: OfflineCache, debounce: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(cache, debounce, rx));
        (Self { tx }, task)
    }

    pub fn snapshot(&self, snapshot: ConversationSnapshot) {
        let _ = self.tx.send(PersistOp::Snapshot(Box::new(snapshot)));
    }

    pub fn remove(&self, conversation_id: &str) {
        let _ = self.tx.send(PersistOp::Remove(conversation_id.to_string()));
    }

    /// Records which conversation is open, or that none is.
    pub fn active(&self, conversation_id: Option<&str>) {
        let _ = self
            .tx
            .send(PersistOp::Active(conversation_id.map(str::to_string)));
    }

    /// Writes everything scheduled so far to the cache without waiting for
    /// the debounce window.
    pub async fn flush(&self) {
        let (ack, done) = tokio::sync::oneshot::channel();
        if self.tx.send(PersistOp::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

async fn run(cache: OfflineCache, debounce: Duration, mut rx: mpsc::UnboundedReceiver<PersistOp>) {
    let mut pending = Pending::default();
    let mut deadline: Option<Instant> = None;

    loop {
        let op = match deadline {
            Some(at) => tokio::select! {
                op = rx.recv() => op,
                () = tokio::time::sleep_until(at) => {
                    pending.write(&cache);
                    deadline = None;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        let Some(op) = op else { break };
        match op {
            PersistOp::Snapshot(snapshot) => {
                trace!(conversation_id = %snapshot.conversation.id, "snapshot scheduled");
                pending
                    .snapshots
                    .insert(snapshot.conversation.id.clone(), Some(*snapshot));
            }
            PersistOp::Remove(id) => {
                pending.snapshots.insert(id, None);
            }
            PersistOp::Active(id) => pending.active = Some(id),
            PersistOp::Flush(ack) => {
                if !pending.is_empty() {
                    pending.write(&cache);
                }
                deadline = None;
                cache.flush().await;
                let _ = ack.send(());
                continue;
            }
        }
        if deadline.is_none() {
            deadline = Some(Instant::now() + debounce);
        }
    }

    if !pending.is_empty() {
        pending.write(&cache);
    }
    debug!("persistence scheduler stopped");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use courier_core::{
        Conversation, ConversationStatus, CourierError, KeyValueStore, Priority,
    };
    use courier_storage::{LAST_ACTIVE_KEY, messages_key};

    use super::*;

    #[derive(Default)]
    struct MemKv {
        data: Mutex<Map<String, String>>,
        writes: Mutex<usize>,
    }

    #[async_trait]
    impl KeyValueStore for MemKv {
        async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), CourierError> {
            *self.writes.lock().unwrap() += 1;
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn remove(&self, key: &str) -> Result<(), CourierError> {
            *self.writes.lock().unwrap() += 1;
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn snapshot(id: &str, last: &str) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation: Conversation {
                id: id.into(),
                counterparty_id: "d1".into(),
                counterparty_name: "d1".into(),
                last_message: Some(last.into()),
                last_message_at: Some(Utc::now()),
                unread_count: 0,
                status: ConversationStatus::Active,
                priority: Priority::Normal,
                assigned_agent_id: None,
            },
            messages: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn writes_within_the_window_coalesce() {
        let kv = Arc::new(MemKv::default());
        let (cache, _writer) = OfflineCache::spawn(kv.clone(), 16);
        let (persist, _task) = PersistScheduler::spawn(cache, Duration::from_secs(1));

        persist.snapshot(snapshot("c1", "one"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        persist.snapshot(snapshot("c1", "two"));
        persist.active(Some("c1"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        persist.snapshot(snapshot("c1", "three"));
        assert_eq!(*kv.writes.lock().unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        persist.flush().await;

        assert_eq!(*kv.writes.lock().unwrap(), 2);
        let stored = kv.data.lock().unwrap().get(&messages_key("c1")).cloned().unwrap();
        assert!(stored.contains("three"));
        assert_eq!(
            kv.data.lock().unwrap().get(LAST_ACTIVE_KEY).map(String::as_str),
            Some("c1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn removal_and_cleared_pointer_are_persisted() {
        let kv = Arc::new(MemKv::default());
        let (cache, _writer) = OfflineCache::spawn(kv.clone(), 16);
        let (persist, _task) = PersistScheduler::spawn(cache, Duration::from_secs(1));

        persist.snapshot(snapshot("c1", "x"));
        persist.active(Some("c1"));
        persist.flush().await;
        assert!(kv.data.lock().unwrap().contains_key(&messages_key("c1")));

        persist.remove("c1");
        persist.active(None);
        persist.flush().await;
        assert!(kv.data.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_flushes() {
        let kv = Arc::new(MemKv::default());
        let (cache, writer) = OfflineCache::spawn(kv.clone(), 16);
        let (persist, task) = PersistScheduler::spawn(cache, Duration::from_secs(60));

        persist.snapshot(snapshot("c9", "bye"));
        drop(persist);
        task.await.unwrap();
        writer.await.unwrap();
        assert!(kv.data.lock().unwrap().contains_key(&messages_key("c9")));
    }
}
