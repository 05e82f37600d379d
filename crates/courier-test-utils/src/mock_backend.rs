// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory REST backend with scriptable failures.
//!
//! Every call is recorded by operation name (the `BackendApi` method name).
//! Sent messages get sequential server ids (`srv-1`, `srv-2`, ...) and are
//! appended to the message history, so a later poll sees them as the
//! sender's own messages.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use courier_core::types::{
    Attachment, HistoryPage, RemoteConversation, RemoteMessage, SendMessageRequest,
};
use courier_core::{BackendApi, ConversationStatus, CourierError};

/// A scripted failure for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The backend answered with this HTTP status.
    Status(u16),
    /// No response at all.
    Unreachable,
}

impl Failure {
    fn into_error(self, op: &str) -> CourierError {
        match self {
            Failure::Status(status) => {
                CourierError::backend(Some(status), format!("{op}: scripted {status}"))
            }
            Failure::Unreachable => CourierError::transport(format!("{op}: scripted outage")),
        }
    }
}

#[derive(Default)]
struct State {
    user_id: String,
    conversations: Vec<RemoteConversation>,
    conversation_messages: HashMap<String, Vec<RemoteMessage>>,
    history: Vec<RemoteMessage>,
    failures: HashMap<String, VecDeque<Failure>>,
    calls: Vec<String>,
    sent: Vec<SendMessageRequest>,
    read: Vec<String>,
    status_updates: Vec<(String, ConversationStatus)>,
    next_id: u64,
    send_delay: Option<Duration>,
}

pub struct MockBackend {
    state: Mutex<State>,
}

impl MockBackend {
    /// A backend for `user_id`: messages it accepts are attributed to them.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State {
                user_id: user_id.into(),
                ..State::default()
            }),
        }
    }

    pub fn with_conversations(self, conversations: Vec<RemoteConversation>) -> Self {
        self.state.lock().unwrap().conversations = conversations;
        self
    }

    /// Page returned for `list_conversation_messages(conversation_id, ..)`.
    pub fn with_conversation_messages(
        self,
        conversation_id: &str,
        messages: Vec<RemoteMessage>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .conversation_messages
            .insert(conversation_id.to_string(), messages);
        self
    }

    /// Holds every `send_message` for `delay` before answering.
    pub fn with_send_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().send_delay = Some(delay);
        self
    }

    /// Adds a message to the history returned by `fetch_message_history`.
    pub fn push_history(&self, message: RemoteMessage) {
        self.state.lock().unwrap().history.push(message);
    }

    /// The next call to `op` fails with `failure`. Repeated calls queue up.
    pub fn fail_next(&self, op: &str, failure: Failure) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Every call so far, by operation name, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == op)
            .count()
    }

    /// Requests accepted by `send_message`, failed ones excluded.
    pub fn sent(&self) -> Vec<SendMessageRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Message ids passed to `mark_read`, across all calls.
    pub fn read_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().read.clone()
    }

    pub fn status_updates(&self) -> Vec<(String, ConversationStatus)> {
        self.state.lock().unwrap().status_updates.clone()
    }

    /// Records the call and pops any scripted failure for it.
    fn call(&self, op: &str) -> Result<(), CourierError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        match state.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(failure) => Err(failure.into_error(op)),
            None => Ok(()),
        }
    }
}

/// A server-side message, for seeding histories.
pub fn remote_message(
    id: &str,
    conversation_id: &str,
    sender_id: &str,
    body: &str,
) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        sender_name: None,
        recipient_id: None,
        body: body.to_string(),
        attachment_url: None,
        sent_at: Utc::now(),
        priority: Default::default(),
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn fetch_message_history(
        &self,
        page: u32,
        size: u32,
    ) -> Result<HistoryPage, CourierError> {
        self.call("fetch_message_history")?;
        let state = self.state.lock().unwrap();
        let start = (page as usize).saturating_mul(size as usize);
        let messages: Vec<RemoteMessage> = state
            .history
            .iter()
            .skip(start)
            .take(size as usize)
            .cloned()
            .collect();
        Ok(HistoryPage {
            has_more: start + messages.len() < state.history.len(),
            messages,
            page,
        })
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, CourierError> {
        let delay = self.state.lock().unwrap().send_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.call("send_message")?;

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let message = RemoteMessage {
            id: format!("srv-{}", state.next_id),
            conversation_id: request
                .conversation_id
                .clone()
                .unwrap_or_else(|| "new".to_string()),
            sender_id: state.user_id.clone(),
            sender_name: None,
            recipient_id: request.recipient_id.clone(),
            body: request.body.clone(),
            attachment_url: request.attachment_url.clone(),
            sent_at: Utc::now(),
            priority: request.priority,
        };
        state.sent.push(request.clone());
        state.history.push(message.clone());
        Ok(message)
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<(), CourierError> {
        self.call("mark_read")?;
        self.state
            .lock()
            .unwrap()
            .read
            .extend(message_ids.iter().cloned());
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>, CourierError> {
        self.call("list_conversations")?;
        Ok(self.state.lock().unwrap().conversations.clone())
    }

    async fn list_conversation_messages(
        &self,
        conversation_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Vec<RemoteMessage>, CourierError> {
        self.call("list_conversation_messages")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .conversation_messages
            .get(conversation_id)
            .map(|all| {
                all.iter()
                    .skip((page as usize).saturating_mul(size as usize))
                    .take(size as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_conversation_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<(), CourierError> {
        self.call("update_conversation_status")?;
        self.state
            .lock()
            .unwrap()
            .status_updates
            .push((conversation_id.to_string(), status));
        Ok(())
    }

    async fn assign_conversation(
        &self,
        _conversation_id: &str,
        _agent_id: &str,
    ) -> Result<(), CourierError> {
        self.call("assign_conversation")
    }

    async fn delete_conversation(&self, _conversation_id: &str) -> Result<(), CourierError> {
        self.call("delete_conversation")
    }

    async fn upload_attachment(&self, attachment: &Attachment) -> Result<String, CourierError> {
        self.call("upload_attachment")?;
        Ok(format!("https://files.test/{}", attachment.file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: &str) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id: Some("c1".into()),
            recipient_id: None,
            body: body.into(),
            attachment_url: None,
            client_id: "tmp-1".into(),
            priority: Default::default(),
            location: None,
        }
    }

    #[tokio::test]
    async fn sent_messages_get_sequential_ids_and_join_history() {
        let backend = MockBackend::new("u1");
        let first = backend.send_message(&request("a")).await.unwrap();
        let second = backend.send_message(&request("b")).await.unwrap();
        assert_eq!(first.id, "srv-1");
        assert_eq!(second.id, "srv-2");
        assert_eq!(second.sender_id, "u1");

        let page = backend.fetch_message_history(0, 10).await.unwrap();
        assert_eq!(page.messages.len(), 2);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn scripted_failures_fire_once_in_order() {
        let backend = MockBackend::new("u1");
        backend.fail_next("mark_read", Failure::Status(500));
        backend.fail_next("mark_read", Failure::Unreachable);

        let first = backend.mark_read(&["m1".into()]).await.unwrap_err();
        assert!(matches!(first, CourierError::Backend { status: Some(500), .. }));
        assert!(backend.mark_read(&["m1".into()]).await.is_err());
        backend.mark_read(&["m2".into()]).await.unwrap();

        assert_eq!(backend.call_count("mark_read"), 3);
        assert_eq!(backend.read_ids(), vec!["m2".to_string()]);
    }

    #[tokio::test]
    async fn history_pages() {
        let backend = MockBackend::new("u1");
        for i in 0..5 {
            backend.push_history(remote_message(&format!("m{i}"), "c1", "d1", "hi"));
        }
        let page = backend.fetch_message_history(1, 2).await.unwrap();
        let ids: Vec<_> = page.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m2", "m3"]);
        assert!(page.has_more);
    }
}
