// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation list and per-conversation message logs.
//!
//! All operations are synchronous and short; callers hold the store behind a
//! lock only for the duration of one call and never across an await.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use courier_core::types::DeliveryEvent;
use courier_core::{
    Conversation, ConversationSnapshot, ConversationStatus, CourierError, DeliveryState, Message,
    Priority, SenderRole,
};

/// An accepted inbound chat line, already deduplicated upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Server id, or the content fingerprint when the payload had none.
    pub id: String,
    pub conversation_id: Option<String>,
    pub counterparty_id: String,
    pub counterparty_name: Option<String>,
    pub body: String,
    pub attachment_ref: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundOutcome {
    pub conversation_id: String,
    /// A conversation was created for a previously unseen counterparty.
    pub created: bool,
    /// False when a message with the same id was already in the log.
    pub appended: bool,
    /// The message predates the last authoritative list, whose unread count
    /// already includes it. No unread bump was made; no alert is due.
    pub covered: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChange {
    /// The conversation left the working set.
    pub evicted: bool,
    /// The conversation was open in the view, which is now cleared.
    pub view_cleared: bool,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
    logs: HashMap<String, Vec<Message>>,
    active: Option<String>,
    typing: HashSet<String>,
    /// Per listed conversation, the instant its server summary was current.
    synced: HashMap<String, DateTime<Utc>>,
}

fn conversation_not_found(id: &str) -> CourierError {
    CourierError::NotFound {
        kind: "conversation",
        id: id.to_string(),
    }
}

fn message_not_found(id: &str) -> CourierError {
    CourierError::NotFound {
        kind: "message",
        id: id.to_string(),
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an inbound message: resolves (or creates) its conversation,
    /// appends unless the id is already logged, and bumps the unread count
    /// when the conversation is not focused and the message is newer than
    /// the server summary it was listed with.
    pub fn apply_inbound(&mut self, incoming: IncomingMessage) -> InboundOutcome {
        let (conversation_id, created) = self.resolve(&incoming);
        let focused = self.is_focused(&conversation_id);
        let covered = self
            .synced
            .get(&conversation_id)
            .is_some_and(|at| incoming.sent_at <= *at);

        let log = self.logs.entry(conversation_id.clone()).or_default();
        let appended = !log.iter().any(|m| m.id == incoming.id);
        if appended {
            log.push(Message {
                id: incoming.id.clone(),
                conversation_id: conversation_id.clone(),
                sender_role: SenderRole::Other,
                body: incoming.body.clone(),
                attachment_ref: incoming.attachment_ref.clone(),
                sent_at: incoming.sent_at,
                delivery_state: DeliveryState::Confirmed,
            });
            self.typing.remove(&conversation_id);
            if let Some(conv) = self.conversations.get_mut(&conversation_id) {
                if conv.last_message_at.is_none_or(|at| incoming.sent_at >= at) {
                    conv.last_message = Some(incoming.body);
                    conv.last_message_at = Some(incoming.sent_at);
                }
                if !focused && !covered {
                    conv.unread_count = conv.unread_count.saturating_add(1);
                }
                conv.priority = conv.priority.max(incoming.priority);
            }
        } else {
            debug!(
                conversation_id = %conversation_id,
                message_id = %incoming.id,
                "message already logged"
            );
        }

        InboundOutcome {
            conversation_id,
            created,
            appended,
            covered: appended && covered,
        }
    }

    fn resolve(&mut self, incoming: &IncomingMessage) -> (String, bool) {
        if let Some(id) = &incoming.conversation_id
            && self.conversations.contains_key(id)
        {
            return (id.clone(), false);
        }
        if let Some(conv) = self.by_counterparty(&incoming.counterparty_id) {
            return (conv.id.clone(), false);
        }

        let id = incoming
            .conversation_id
            .clone()
            .unwrap_or_else(|| incoming.counterparty_id.clone());
        let name = incoming
            .counterparty_name
            .clone()
            .unwrap_or_else(|| incoming.counterparty_id.clone());
        self.insert_new(&id, &incoming.counterparty_id, name, incoming.priority);
        (id, true)
    }

    fn insert_new(&mut self, id: &str, counterparty_id: &str, name: String, priority: Priority) {
        self.conversations.insert(
            id.to_string(),
            Conversation {
                id: id.to_string(),
                counterparty_id: counterparty_id.to_string(),
                counterparty_name: name,
                last_message: None,
                last_message_at: None,
                unread_count: 0,
                status: ConversationStatus::Active,
                priority,
                assigned_agent_id: None,
            },
        );
        debug!(conversation_id = %id, counterparty_id, "conversation created");
    }

    /// Creates an empty conversation unless one with `id` exists.
    pub fn ensure_conversation(
        &mut self,
        id: &str,
        counterparty_id: &str,
        counterparty_name: Option<&str>,
    ) -> bool {
        if self.conversations.contains_key(id) {
            return false;
        }
        let name = counterparty_name.unwrap_or(counterparty_id).to_string();
        self.insert_new(id, counterparty_id, name, Priority::Normal);
        true
    }

    /// Appends a pending message with a temporary id and returns a copy.
    pub fn begin_send(
        &mut self,
        conversation_id: &str,
        body: &str,
        attachment_ref: Option<String>,
    ) -> Result<Message, CourierError> {
        let conv = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| conversation_not_found(conversation_id))?;
        let message = Message::optimistic(conversation_id, body, attachment_ref);
        conv.last_message = Some(message.body.clone());
        conv.last_message_at = Some(message.sent_at);
        self.logs
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Replaces the pending entry `temp_id` in place with the confirmed one.
    ///
    /// The server may echo a send before answering it. An already logged
    /// copy with `server_id` is dropped so the log never holds both; if that
    /// copy was taken for the counterparty's message its unread bump is
    /// undone. Returns whether such a misattributed echo was replaced.
    pub fn confirm_send(
        &mut self,
        conversation_id: &str,
        temp_id: &str,
        server_id: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, CourierError> {
        let focused = self.is_focused(conversation_id);
        let log = self
            .logs
            .get_mut(conversation_id)
            .ok_or_else(|| conversation_not_found(conversation_id))?;
        let mut pos = log
            .iter()
            .position(|m| m.id == temp_id)
            .ok_or_else(|| message_not_found(temp_id))?;

        let mut misattributed = false;
        if let Some(echo) = log.iter().position(|m| m.id == server_id) {
            let copy = log.remove(echo);
            if echo < pos {
                pos -= 1;
            }
            misattributed = copy.sender_role == SenderRole::Other;
            debug!(conversation_id, server_id, misattributed, "echo arrived before confirmation");
        }
        log[pos].apply(DeliveryEvent::Confirmed {
            server_id: server_id.to_string(),
            sent_at,
        })?;

        if misattributed
            && !focused
            && let Some(conv) = self.conversations.get_mut(conversation_id)
        {
            conv.unread_count = conv.unread_count.saturating_sub(1);
        }
        self.refresh_preview(conversation_id);
        Ok(misattributed)
    }

    /// Marks the pending entry failed and removes it from the log.
    pub fn fail_send(
        &mut self,
        conversation_id: &str,
        temp_id: &str,
    ) -> Result<Message, CourierError> {
        let log = self
            .logs
            .get_mut(conversation_id)
            .ok_or_else(|| conversation_not_found(conversation_id))?;
        let pos = log
            .iter()
            .position(|m| m.id == temp_id)
            .ok_or_else(|| message_not_found(temp_id))?;
        log[pos].apply(DeliveryEvent::Failed)?;
        let failed = log.remove(pos);
        self.refresh_preview(conversation_id);
        Ok(failed)
    }

    /// Focuses a conversation and zeroes its unread count.
    ///
    /// Returns the ids of the messages that were unread, for the read receipt.
    pub fn select(&mut self, id: &str) -> Result<Vec<String>, CourierError> {
        let conv = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| conversation_not_found(id))?;
        let unread = conv.unread_count as usize;
        conv.unread_count = 0;
        self.active = Some(id.to_string());

        let mut ids: Vec<String> = self
            .logs
            .get(id)
            .map(|log| {
                log.iter()
                    .rev()
                    .filter(|m| m.sender_role == SenderRole::Other && !m.is_temp())
                    .take(unread)
                    .map(|m| m.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        ids.reverse();
        Ok(ids)
    }

    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_focused(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    /// Moves a conversation along its lifecycle. Resolved and archived
    /// conversations leave the working set.
    pub fn set_status(
        &mut self,
        id: &str,
        status: ConversationStatus,
    ) -> Result<StatusChange, CourierError> {
        let conv = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| conversation_not_found(id))?;
        if conv.status == status {
            return Ok(StatusChange::default());
        }
        if !conv.status.can_transition_to(status) {
            return Err(CourierError::InvalidTransition {
                from: conv.status.to_string(),
                to: status.to_string(),
            });
        }
        conv.status = status;

        if status.is_open() {
            return Ok(StatusChange::default());
        }
        let view_cleared = self.is_focused(id);
        self.evict(id);
        Ok(StatusChange {
            evicted: true,
            view_cleared,
        })
    }

    pub fn assign(&mut self, id: &str, agent_id: &str) -> Result<(), CourierError> {
        let conv = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| conversation_not_found(id))?;
        conv.assigned_agent_id = Some(agent_id.to_string());
        Ok(())
    }

    /// Drops a conversation and its log. Clears the view if it was open.
    pub fn remove(&mut self, id: &str) -> Option<ConversationSnapshot> {
        let snapshot = self.snapshot(id);
        self.evict(id);
        snapshot
    }

    fn evict(&mut self, id: &str) {
        self.conversations.remove(id);
        self.logs.remove(id);
        self.typing.remove(id);
        self.synced.remove(id);
        if self.is_focused(id) {
            self.active = None;
        }
    }

    /// Replaces the conversation list with the authoritative one, as the
    /// server saw it at `as_of`.
    ///
    /// Closed conversations are dropped. Local conversations that still hold
    /// pending sends survive even if the server does not list them yet.
    pub fn replace_conversations(&mut self, list: Vec<Conversation>, as_of: DateTime<Utc>) {
        let mut next: HashMap<String, Conversation> = list
            .into_iter()
            .filter(|c| c.status.is_open())
            .map(|c| (c.id.clone(), c))
            .collect();
        self.synced = next
            .values()
            .map(|c| {
                let at = c.last_message_at.map_or(as_of, |last| last.max(as_of));
                (c.id.clone(), at)
            })
            .collect();
        for (id, conv) in &self.conversations {
            if !next.contains_key(id) && self.has_pending(id) {
                next.insert(id.clone(), conv.clone());
            }
        }

        if let Some(active) = self.active.clone() {
            match next.get_mut(&active) {
                Some(conv) => conv.unread_count = 0,
                None => self.active = None,
            }
        }
        self.logs.retain(|id, _| next.contains_key(id));
        self.typing.retain(|id| next.contains_key(id));
        self.conversations = next;
    }

    /// Replaces a conversation's log with the authoritative page, keeping
    /// pending entries the server has not seen yet at the end.
    pub fn replace_messages(
        &mut self,
        conversation_id: &str,
        mut remote: Vec<Message>,
    ) -> Result<(), CourierError> {
        if !self.conversations.contains_key(conversation_id) {
            return Err(conversation_not_found(conversation_id));
        }
        remote.sort_by_key(|m| m.sent_at);
        let mut seen = HashSet::new();
        remote.retain(|m| seen.insert(m.id.clone()));

        if let Some(log) = self.logs.get(conversation_id) {
            let pending = log
                .iter()
                .filter(|m| m.delivery_state == DeliveryState::Pending && !seen.contains(&m.id))
                .cloned()
                .collect::<Vec<_>>();
            remote.extend(pending);
        }
        self.logs.insert(conversation_id.to_string(), remote);
        self.refresh_preview(conversation_id);
        Ok(())
    }

    /// Paints a cached snapshot. Ignored when the conversation is already
    /// known, since anything in memory is at least as fresh as the cache.
    pub fn hydrate(&mut self, snapshot: ConversationSnapshot) -> bool {
        let id = snapshot.conversation.id.clone();
        if self.conversations.contains_key(&id) {
            return false;
        }
        self.conversations.insert(id.clone(), snapshot.conversation);
        self.logs.insert(id.clone(), snapshot.messages);
        if self.active.is_none() {
            self.active = Some(id);
        }
        true
    }

    pub fn snapshot(&self, id: &str) -> Option<ConversationSnapshot> {
        let conversation = self.conversations.get(id)?.clone();
        Some(ConversationSnapshot {
            conversation,
            messages: self.messages(id).to_vec(),
        })
    }

    pub fn active_snapshot(&self) -> Option<ConversationSnapshot> {
        self.active.as_deref().and_then(|id| self.snapshot(id))
    }

    /// Returns whether the flag changed.
    pub fn set_typing(&mut self, conversation_id: &str, typing: bool) -> bool {
        if !self.conversations.contains_key(conversation_id) {
            return false;
        }
        if typing {
            self.typing.insert(conversation_id.to_string())
        } else {
            self.typing.remove(conversation_id)
        }
    }

    pub fn is_typing(&self, conversation_id: &str) -> bool {
        self.typing.contains(conversation_id)
    }

    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    pub fn by_counterparty(&self, counterparty_id: &str) -> Option<&Conversation> {
        self.conversations
            .values()
            .find(|c| c.counterparty_id == counterparty_id)
    }

    /// Conversations, most recent activity first.
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self.conversations.values().cloned().collect();
        list.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.logs
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations
            .values()
            .fold(0u32, |acc, c| acc.saturating_add(c.unread_count))
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    fn has_pending(&self, id: &str) -> bool {
        self.messages(id)
            .iter()
            .any(|m| m.delivery_state == DeliveryState::Pending)
    }

    fn refresh_preview(&mut self, id: &str) {
        let last = self
            .logs
            .get(id)
            .and_then(|log| log.last())
            .map(|m| (m.body.clone(), m.sent_at));
        if let (Some(conv), Some((body, at))) = (self.conversations.get_mut(id), last) {
            conv.last_message = Some(body);
            conv.last_message_at = Some(at);
        }
    }
}
