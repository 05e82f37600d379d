// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator contracts. Implementations live outside the core.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::{
    Attachment, ConversationStatus, HistoryPage, RemoteConversation, RemoteMessage,
    SendMessageRequest,
};

/// The backend system of record, reached over REST.
#[async_trait]
pub trait BackendApi: Send + Sync + 'static {
    async fn fetch_message_history(&self, page: u32, size: u32)
        -> Result<HistoryPage, CourierError>;

    async fn send_message(&self, request: &SendMessageRequest)
        -> Result<RemoteMessage, CourierError>;

    async fn mark_read(&self, message_ids: &[String]) -> Result<(), CourierError>;

    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>, CourierError>;

    async fn list_conversation_messages(
        &self,
        conversation_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Vec<RemoteMessage>, CourierError>;

    async fn update_conversation_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<(), CourierError>;

    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<(), CourierError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), CourierError>;

    /// Uploads a file and returns its public URL.
    async fn upload_attachment(&self, attachment: &Attachment) -> Result<String, CourierError>;
}
