// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP implementation of [`BackendApi`].
//!
//! Transient failures (no response, 429, 500, 502, 503) are retried up to
//! `max_retries` times after a short delay. Sends carry a client id so the
//! server can drop a retried duplicate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use courier_config::model::BackendConfig;
use courier_core::types::{
    Attachment, HistoryPage, RemoteConversation, RemoteMessage, SendMessageRequest,
};
use courier_core::{BackendApi, ConversationStatus, CourierError};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadBody<'a> {
    message_ids: &'a [String],
}

#[derive(Serialize)]
struct StatusBody {
    status: ConversationStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody<'a> {
    agent_id: &'a str,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, CourierError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CourierError::Config(format!("invalid backend.base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CourierError::Config(format!(
                "backend.base_url `{}` cannot carry a path",
                config.base_url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: None,
            max_retries: config.max_retries,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Authenticates every request with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, CourierError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CourierError::Config("backend.base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(
        &self,
        make: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<reqwest::Response, CourierError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying backend request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let mut request = make(&self.client);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        status = %response.status(),
                        url = %response.url(),
                        attempt,
                        "backend call ok"
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let message = format!("backend returned {status}: {body}");
                    CourierError::backend(Some(status), message)
                }
                Err(e) => CourierError::Backend {
                    status: None,
                    message: format!("request failed: {e}"),
                    source: Some(Box::new(e)),
                },
            };

            if !error.is_transient() || attempt == self.max_retries {
                return Err(error);
            }
            debug!(error = %error, "transient backend failure");
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| CourierError::backend(None, "request failed after retries")))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        make: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<T, CourierError> {
        let response = self.execute(make).await?;
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| CourierError::Backend {
            status: Some(status),
            message: format!("unreadable response body: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

fn paged(mut url: Url, page: u32, size: u32) -> Url {
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("size", &size.to_string());
    url
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn fetch_message_history(
        &self,
        page: u32,
        size: u32,
    ) -> Result<HistoryPage, CourierError> {
        let url = paged(self.url(&["messages"])?, page, size);
        self.json(|c| c.get(url.clone())).await
    }

    async fn send_message(
        &self,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, CourierError> {
        let url = self.url(&["messages"])?;
        self.json(|c| c.post(url.clone()).json(request)).await
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<(), CourierError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        let url = self.url(&["messages", "read"])?;
        let body = MarkReadBody { message_ids };
        self.execute(|c| c.post(url.clone()).json(&body)).await?;
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>, CourierError> {
        let url = self.url(&["conversations"])?;
        self.json(|c| c.get(url.clone())).await
    }

    async fn list_conversation_messages(
        &self,
        conversation_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Vec<RemoteMessage>, CourierError> {
        let url = paged(
            self.url(&["conversations", conversation_id, "messages"])?,
            page,
            size,
        );
        self.json(|c| c.get(url.clone())).await
    }

    async fn update_conversation_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<(), CourierError> {
        let url = self.url(&["conversations", conversation_id, "status"])?;
        let body = StatusBody { status };
        self.execute(|c| c.patch(url.clone()).json(&body)).await?;
        Ok(())
    }

    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
    ) -> Result<(), CourierError> {
        let url = self.url(&["conversations", conversation_id, "assign"])?;
        let body = AssignBody { agent_id };
        self.execute(|c| c.put(url.clone()).json(&body)).await?;
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), CourierError> {
        let url = self.url(&["conversations", conversation_id])?;
        self.execute(|c| c.delete(url.clone())).await?;
        Ok(())
    }

    async fn upload_attachment(&self, attachment: &Attachment) -> Result<String, CourierError> {
        let url = self.url(&["attachments"])?;
        let content_type = HeaderValue::from_str(&attachment.content_type)
            .map_err(|e| CourierError::AttachmentUpload {
                message: format!("invalid content type `{}`: {e}", attachment.content_type),
                source: None,
            })?;
        let file_name = HeaderValue::from_str(&attachment.file_name).map_err(|e| {
            CourierError::AttachmentUpload {
                message: format!("invalid file name `{}`: {e}", attachment.file_name),
                source: None,
            }
        })?;
        let uploaded: UploadResponse = self
            .json(|c| {
                c.post(url.clone())
                    .header(CONTENT_TYPE, content_type.clone())
                    .header("x-file-name", file_name.clone())
                    .body(attachment.bytes.clone())
            })
            .await?;
        Ok(uploaded.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(&BackendConfig {
            base_url: base.into(),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn urls_join_segments_and_escape_ids() {
        let b = backend("http://localhost:3000/api");
        assert_eq!(
            b.url(&["conversations", "c 1", "messages"]).unwrap().as_str(),
            "http://localhost:3000/api/conversations/c%201/messages"
        );
        let trailing = backend("http://localhost:3000/api/");
        assert_eq!(
            trailing.url(&["messages"]).unwrap().as_str(),
            "http://localhost:3000/api/messages"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        for bad in ["not a url", "mailto:ops@example.com"] {
            let err = HttpBackend::new(&BackendConfig {
                base_url: bad.into(),
                ..BackendConfig::default()
            })
            .unwrap_err();
            assert!(matches!(err, CourierError::Config(_)), "{bad}");
        }
    }
}
