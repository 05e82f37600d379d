// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared synchronization core.
//!
//! Every inbound occurrence, whether it arrived over the channel, from the
//! history poller or as a push, goes through [`SyncCore::ingest`]: decode,
//! one dedup decision, one store or feed mutation, then routing to the
//! presentation adapters. User actions (send, select, status changes) go
//! through the REST backend and reconcile the same store.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_bus::{DedupFilter, EventRouter, Fingerprint, Verdict};
use courier_config::CourierConfig;
use courier_connection::ConnectionManager;
use courier_conversation::{ConversationStore, PersistScheduler, StatusChange};
use courier_core::events::{ChatMessageEvent, TypingEvent};
use courier_core::types::{Attachment, DeliveryEvent, GeoPoint, SendMessageRequest};
use courier_core::{
    BackendApi, Channel, ChannelEvent, Conversation, ConversationSnapshot, ConversationStatus,
    CourierError, EventName, EventSource, Identity, InboundEvent, LocationProvider, Message,
    NotificationKind, Priority, SideEffectSink,
};
use courier_feed::NotificationFeed;
use courier_storage::OfflineCache;
use courier_sw::PushPayload;

use crate::ingest::{self, SUPPORT_COUNTERPARTY, SUPPORT_NAME};
use crate::tasks;

/// Tunables the core reads from [`CourierConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub page_size: u32,
    /// `None` disables the history poller.
    pub poll_interval: Option<Duration>,
    pub poll_page_size: u32,
    /// Poll even while the channel is authenticated.
    pub poll_always: bool,
    pub location_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&CourierConfig::default())
    }
}

impl From<&CourierConfig> for SyncSettings {
    fn from(config: &CourierConfig) -> Self {
        Self {
            page_size: config.conversations.page_size,
            poll_interval: config
                .polling
                .enabled
                .then(|| Duration::from_secs(config.polling.interval_secs.max(1))),
            poll_page_size: config.polling.page_size,
            poll_always: config.polling.always,
            location_timeout: Duration::from_millis(config.location.timeout_ms),
        }
    }
}

/// What changed in the conversation model, for views that redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    Conversations,
    Messages { conversation_id: String },
    Typing { conversation_id: String, typing: bool },
}

pub(crate) struct Inner {
    pub(crate) identity: Identity,
    pub(crate) settings: SyncSettings,
    pub(crate) connection: ConnectionManager,
    pub(crate) inbound: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    pub(crate) backend: Arc<dyn BackendApi>,
    pub(crate) router: EventRouter,
    pub(crate) dedup: Mutex<DedupFilter>,
    pub(crate) store: Mutex<ConversationStore>,
    pub(crate) feed: NotificationFeed,
    pub(crate) cache: OfflineCache,
    pub(crate) persist: PersistScheduler,
    pub(crate) effects: Arc<dyn SideEffectSink>,
    pub(crate) location: Arc<dyn LocationProvider>,
    pub(crate) updates: broadcast::Sender<SyncUpdate>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone; clones share one core.
#[derive(Clone)]
pub struct SyncCore {
    pub(crate) inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("sync core lock poisoned, continuing");
        poisoned.into_inner()
    })
}

fn conversation_not_found(id: &str) -> CourierError {
    CourierError::NotFound {
        kind: "conversation",
        id: id.to_string(),
    }
}

impl SyncCore {
    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Paints the cached conversation, starts the background tasks, opens
    /// the channel and fetches the authoritative conversation list.
    ///
    /// A failed fetch is logged, not returned: the channel and poller keep
    /// the model converging.
    pub async fn start(&self) -> Result<(), CourierError> {
        let inbound = lock(&self.inner.inbound)
            .take()
            .ok_or_else(|| CourierError::Internal("sync core already started".into()))?;

        if let Err(e) = self.rehydrate().await {
            warn!(error = %e, "offline cache unreadable, starting empty");
        }

        let weak = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        let mut handles = vec![
            tokio::spawn(tasks::pump(weak.clone(), inbound, cancel.clone())),
            tokio::spawn(tasks::offline_indicator(
                self.inner.connection.watch_state(),
                Arc::clone(&self.inner.effects),
                cancel.clone(),
            )),
        ];
        if let Some(every) = self.inner.settings.poll_interval {
            handles.push(tokio::spawn(tasks::poll(weak, every, cancel)));
        }
        lock(&self.inner.tasks).extend(handles);

        self.inner.connection.connect(self.inner.identity.clone());
        info!(
            user_id = %self.inner.identity.user_id,
            role = %self.inner.identity.role,
            "sync core started"
        );

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "initial refresh failed");
        }
        Ok(())
    }

    /// Stops background work, closes the channel and writes pending state.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles = std::mem::take(&mut *lock(&self.inner.tasks));
        for handle in handles {
            let _ = handle.await;
        }
        self.inner.connection.shutdown().await;
        self.inner.persist.flush().await;
        self.inner.cache.flush().await;
        info!("sync core stopped");
    }

    // --- Inbound ---

    /// Runs one raw occurrence through decode, dedup, apply and routing.
    ///
    /// Duplicates and self-echoes come back as a [`Verdict`], not an error.
    pub fn ingest(&self, raw: &InboundEvent, source: EventSource) -> Result<Verdict, CourierError> {
        let event = ChannelEvent::decode(raw)?;
        let verdict = lock(&self.inner.dedup).check(&event, source);
        if !verdict.is_accepted() {
            debug!(event = %event.name(), ?source, ?verdict, "inbound dropped");
            return Ok(verdict);
        }

        self.apply(&event);
        let handlers = self.inner.router.dispatch(&event, source);
        debug!(event = %event.name(), ?source, handlers, "inbound applied");
        Ok(verdict)
    }

    /// Feeds a push payload through the same path as channel events.
    pub fn ingest_push(&self, raw: &serde_json::Value) -> Result<Verdict, CourierError> {
        let inbound = PushPayload::parse(raw).to_inbound();
        self.ingest(&inbound, EventSource::Push)
    }

    fn apply(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::DriverMessage(chat) | ChannelEvent::AdminMessage(chat) => {
                self.apply_chat(event, chat);
            }
            ChannelEvent::DriverTyping(typing) | ChannelEvent::AdminTyping(typing) => {
                self.apply_typing(typing);
            }
            other => {
                if let Some(item) = ingest::notification_for(other) {
                    self.inner.feed.push(item);
                }
            }
        }
    }

    fn apply_chat(&self, event: &ChannelEvent, chat: &ChatMessageEvent) {
        let id = event
            .stable_id()
            .map(str::to_string)
            .unwrap_or_else(|| Fingerprint::of(event).as_str().to_string());
        let incoming = ingest::incoming_from_chat(chat, id, self.inner.identity.role);

        let (outcome, focused_snapshot) = {
            let mut store = lock(&self.inner.store);
            let outcome = store.apply_inbound(incoming);
            let snapshot = store
                .is_focused(&outcome.conversation_id)
                .then(|| store.snapshot(&outcome.conversation_id))
                .flatten();
            (outcome, snapshot)
        };
        if !outcome.appended {
            return;
        }

        let focused = focused_snapshot.is_some();
        if let Some(snapshot) = focused_snapshot {
            self.inner.persist.snapshot(snapshot);
        }
        self.publish(SyncUpdate::Conversations);
        self.publish(SyncUpdate::Messages {
            conversation_id: outcome.conversation_id.clone(),
        });
        if outcome.covered {
            debug!(
                conversation_id = %outcome.conversation_id,
                "history already counted by the server"
            );
        } else if !focused {
            self.inner
                .feed
                .push(ingest::chat_notification(chat, &outcome.conversation_id));
        }
    }

    fn apply_typing(&self, typing: &TypingEvent) {
        let counterparty = ingest::typing_counterparty(typing, self.inner.identity.role);
        let changed = {
            let mut store = lock(&self.inner.store);
            let target = typing
                .conversation_id
                .as_deref()
                .filter(|id| store.conversation(id).is_some())
                .map(str::to_string)
                .or_else(|| store.by_counterparty(&counterparty).map(|c| c.id.clone()));
            target.filter(|id| store.set_typing(id, typing.is_typing))
        };
        if let Some(conversation_id) = changed {
            self.publish(SyncUpdate::Typing {
                conversation_id,
                typing: typing.is_typing,
            });
        }
    }

    // --- Outbound ---

    /// Sends a chat line into a known conversation.
    ///
    /// The message is visible at once as pending. An attachment is uploaded
    /// first; if that fails nothing is appended or sent.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        body: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message, CourierError> {
        self.send_with(conversation_id, body, attachment, Priority::Normal, None)
            .await
    }

    /// Sends an emergency line into the support thread, with the current
    /// location if it can be had within the configured timeout.
    pub async fn send_emergency(&self, body: &str) -> Result<Message, CourierError> {
        let location = match tokio::time::timeout(
            self.inner.settings.location_timeout,
            self.inner.location.current_location(),
        )
        .await
        {
            Ok(location) => location,
            Err(_) => {
                warn!("location not available in time, sending emergency without it");
                None
            }
        };
        let conversation_id = self.support_conversation_id();
        self.send_with(&conversation_id, body, None, Priority::Emergency, location)
            .await
    }

    async fn send_with(
        &self,
        conversation_id: &str,
        body: &str,
        attachment: Option<Attachment>,
        priority: Priority,
        location: Option<GeoPoint>,
    ) -> Result<Message, CourierError> {
        let recipient_id = lock(&self.inner.store)
            .conversation(conversation_id)
            .map(|c| c.counterparty_id.clone())
            .ok_or_else(|| conversation_not_found(conversation_id))?;

        let attachment_url = match attachment {
            Some(attachment) => match self.inner.backend.upload_attachment(&attachment).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(file = %attachment.file_name, error = %e, "attachment upload failed");
                    self.report("Attachment not sent", &e);
                    return Err(CourierError::AttachmentUpload {
                        message: format!("could not upload {}", attachment.file_name),
                        source: Some(Box::new(e)),
                    });
                }
            },
            None => None,
        };

        let pending = lock(&self.inner.store).begin_send(
            conversation_id,
            body,
            attachment_url.clone(),
        )?;
        self.touched(conversation_id);

        let request = SendMessageRequest {
            client_id: pending.id.clone(),
            conversation_id: Some(conversation_id.to_string()),
            recipient_id: (recipient_id != SUPPORT_COUNTERPARTY).then_some(recipient_id),
            body: body.to_string(),
            attachment_url,
            priority,
            location,
        };

        match self.inner.backend.send_message(&request).await {
            Ok(remote) => {
                lock(&self.inner.dedup).remember(Fingerprint::from_id(&remote.id));
                let confirmed = lock(&self.inner.store).confirm_send(
                    conversation_id,
                    &pending.id,
                    &remote.id,
                    remote.sent_at,
                );
                match confirmed {
                    Ok(true) => self.retract_message_alerts(&remote.id),
                    Ok(false) => {}
                    Err(e) => debug!(error = %e, "confirmed message no longer in view"),
                }
                self.touched(conversation_id);

                let mut confirmed = pending;
                confirmed.apply(DeliveryEvent::Confirmed {
                    server_id: remote.id,
                    sent_at: remote.sent_at,
                })?;
                Ok(confirmed)
            }
            Err(e) => {
                if let Err(err) = lock(&self.inner.store).fail_send(conversation_id, &pending.id) {
                    debug!(error = %err, "failed message no longer in view");
                }
                self.touched(conversation_id);
                warn!(conversation_id, error = %e, "send failed");
                self.report("Message not sent", &e);
                Err(CourierError::Send {
                    message: format!("message to {conversation_id} was not delivered"),
                    source: Some(Box::new(e)),
                })
            }
        }
    }

    /// Tells the other side the local user is (or stopped) typing.
    /// Returns false when the channel is not up.
    pub fn send_typing(&self, conversation_id: &str, typing: bool) -> bool {
        let identity = &self.inner.identity;
        self.inner.connection.emit(
            EventName::typing_from(identity.role),
            json!({
                "conversationId": conversation_id,
                "senderId": identity.user_id,
                "isTyping": typing,
                "timestamp": Utc::now(),
            }),
        )
    }

    /// The driver's support thread, created locally if it does not exist yet.
    pub fn support_conversation_id(&self) -> String {
        let mut store = lock(&self.inner.store);
        if let Some(conv) = store.by_counterparty(SUPPORT_COUNTERPARTY) {
            return conv.id.clone();
        }
        let id = self.inner.identity.user_id.clone();
        store.ensure_conversation(&id, SUPPORT_COUNTERPARTY, Some(SUPPORT_NAME));
        drop(store);
        self.publish(SyncUpdate::Conversations);
        id
    }

    // --- Conversation management ---

    /// Opens a conversation: zeroes its unread count and sends a read
    /// receipt. A failed receipt is logged and otherwise ignored.
    pub async fn select_conversation(&self, id: &str) -> Result<(), CourierError> {
        let (unread, snapshot) = {
            let mut store = lock(&self.inner.store);
            let unread = store.select(id)?;
            (unread, store.snapshot(id))
        };
        self.inner.persist.active(Some(id));
        if let Some(snapshot) = snapshot {
            self.inner.persist.snapshot(snapshot);
        }
        self.publish(SyncUpdate::Conversations);

        if !unread.is_empty()
            && let Err(e) = self.inner.backend.mark_read(&unread).await
        {
            warn!(conversation_id = id, error = %e, "read receipt failed");
        }
        Ok(())
    }

    pub fn clear_selection(&self) {
        lock(&self.inner.store).clear_selection();
        self.inner.persist.active(None);
        self.publish(SyncUpdate::Conversations);
    }

    /// Moves a conversation along its lifecycle on the server, then locally.
    pub async fn set_status(
        &self,
        id: &str,
        status: ConversationStatus,
    ) -> Result<StatusChange, CourierError> {
        {
            let store = lock(&self.inner.store);
            let current = store
                .conversation(id)
                .ok_or_else(|| conversation_not_found(id))?
                .status;
            if current != status && !current.can_transition_to(status) {
                return Err(CourierError::InvalidTransition {
                    from: current.to_string(),
                    to: status.to_string(),
                });
            }
        }
        if let Err(e) = self.inner.backend.update_conversation_status(id, status).await {
            self.report("Status not changed", &e);
            return Err(e);
        }

        let change = lock(&self.inner.store).set_status(id, status)?;
        if change.evicted {
            self.inner.persist.remove(id);
            if change.view_cleared {
                self.inner.persist.active(None);
            }
        } else {
            self.persist_if_focused(id);
        }
        self.publish(SyncUpdate::Conversations);
        Ok(change)
    }

    pub async fn assign(&self, id: &str, agent_id: &str) -> Result<(), CourierError> {
        if lock(&self.inner.store).conversation(id).is_none() {
            return Err(conversation_not_found(id));
        }
        if let Err(e) = self.inner.backend.assign_conversation(id, agent_id).await {
            self.report("Assignment failed", &e);
            return Err(e);
        }
        lock(&self.inner.store).assign(id, agent_id)?;
        self.persist_if_focused(id);
        self.publish(SyncUpdate::Conversations);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), CourierError> {
        if lock(&self.inner.store).conversation(id).is_none() {
            return Err(conversation_not_found(id));
        }
        if let Err(e) = self.inner.backend.delete_conversation(id).await {
            self.report("Delete failed", &e);
            return Err(e);
        }
        let was_focused = {
            let mut store = lock(&self.inner.store);
            let focused = store.is_focused(id);
            store.remove(id);
            focused
        };
        self.inner.persist.remove(id);
        if was_focused {
            self.inner.persist.active(None);
        }
        self.publish(SyncUpdate::Conversations);
        Ok(())
    }

    // --- Reconciliation ---

    /// Replaces the conversation list with the server's, then reloads the
    /// open conversation's messages.
    pub async fn refresh(&self) -> Result<(), CourierError> {
        let as_of = Utc::now();
        let remote = self.inner.backend.list_conversations().await?;
        let active = {
            let mut store = lock(&self.inner.store);
            store.replace_conversations(
                remote.into_iter().map(Conversation::from).collect(),
                as_of,
            );
            store.active_id().map(str::to_string)
        };
        self.publish(SyncUpdate::Conversations);
        if let Some(id) = active {
            self.load_messages(&id).await?;
        }
        Ok(())
    }

    /// Replaces one conversation's log with the server's first page.
    pub async fn load_messages(&self, conversation_id: &str) -> Result<(), CourierError> {
        let remote = self
            .inner
            .backend
            .list_conversation_messages(conversation_id, 0, self.inner.settings.page_size)
            .await?;
        let local_user = &self.inner.identity.user_id;
        {
            let mut dedup = lock(&self.inner.dedup);
            for m in &remote {
                dedup.remember(Fingerprint::from_id(&m.id));
            }
        }
        let messages = remote
            .into_iter()
            .map(|m| ingest::message_from_remote(m, local_user))
            .collect();
        lock(&self.inner.store).replace_messages(conversation_id, messages)?;
        self.touched(conversation_id);
        Ok(())
    }

    /// Paints the last open conversation from the offline cache. Returns
    /// whether anything was painted.
    pub async fn rehydrate(&self) -> Result<bool, CourierError> {
        let Some(snapshot) = self.inner.cache.load_last_active().await? else {
            return Ok(false);
        };
        let id = snapshot.conversation.id.clone();
        let painted = lock(&self.inner.store).hydrate(snapshot);
        if painted {
            debug!(conversation_id = %id, "painted cached conversation");
            self.publish(SyncUpdate::Conversations);
            self.publish(SyncUpdate::Messages {
                conversation_id: id,
            });
        }
        Ok(painted)
    }

    /// Fetches one page of message history and ingests it as polled events.
    /// Returns how many were new.
    pub async fn poll_once(&self) -> Result<usize, CourierError> {
        let mut page = self
            .inner
            .backend
            .fetch_message_history(0, self.inner.settings.poll_page_size)
            .await?;
        page.messages.sort_by_key(|m| m.sent_at);

        let mut accepted = 0;
        for remote in &page.messages {
            let raw = ingest::inbound_from_remote(remote, self.inner.identity.role);
            match self.ingest(&raw, EventSource::Polling) {
                Ok(Verdict::Accept) => accepted += 1,
                Ok(_) => {}
                Err(e) => warn!(message_id = %remote.id, error = %e, "skipping polled message"),
            }
        }
        Ok(accepted)
    }

    // --- Views ---

    pub fn conversations(&self) -> Vec<Conversation> {
        lock(&self.inner.store).conversations()
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        lock(&self.inner.store).conversation(id).cloned()
    }

    pub fn messages(&self, conversation_id: &str) -> Vec<Message> {
        lock(&self.inner.store).messages(conversation_id).to_vec()
    }

    pub fn active_id(&self) -> Option<String> {
        lock(&self.inner.store).active_id().map(str::to_string)
    }

    pub fn active_snapshot(&self) -> Option<ConversationSnapshot> {
        lock(&self.inner.store).active_snapshot()
    }

    pub fn total_unread(&self) -> u32 {
        lock(&self.inner.store).total_unread()
    }

    pub fn is_typing(&self, conversation_id: &str) -> bool {
        lock(&self.inner.store).is_typing(conversation_id)
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.inner.feed
    }

    pub fn router(&self) -> &EventRouter {
        &self.inner.router
    }

    /// The channel owner, for sign-in and sign-out flows.
    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    pub fn channel(&self) -> Channel {
        self.inner.connection.channel()
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<SyncUpdate> {
        self.inner.updates.subscribe()
    }

    // --- Internal ---

    fn publish(&self, update: SyncUpdate) {
        let _ = self.inner.updates.send(update);
    }

    fn report(&self, title: &str, error: &CourierError) {
        self.inner
            .feed
            .push(ingest::error_notification(title, &error.to_string()));
    }

    /// Dismisses "new message" items raised for one of our own sends.
    fn retract_message_alerts(&self, message_id: &str) {
        let feed = &self.inner.feed;
        for item in feed.items() {
            if item.kind == NotificationKind::Message
                && item.source_data["messageId"].as_str() == Some(message_id)
            {
                feed.dismiss(&item.id);
            }
        }
    }

    /// Publishes a log change and schedules a cache write if it is open.
    fn touched(&self, conversation_id: &str) {
        self.persist_if_focused(conversation_id);
        self.publish(SyncUpdate::Conversations);
        self.publish(SyncUpdate::Messages {
            conversation_id: conversation_id.to_string(),
        });
    }

    fn persist_if_focused(&self, conversation_id: &str) {
        let snapshot = {
            let store = lock(&self.inner.store);
            store
                .is_focused(conversation_id)
                .then(|| store.snapshot(conversation_id))
                .flatten()
        };
        if let Some(snapshot) = snapshot {
            self.inner.persist.snapshot(snapshot);
        }
    }
}
