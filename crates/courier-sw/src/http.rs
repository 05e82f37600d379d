// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response model seen by the worker, and the network it fetches from.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use courier_core::CourierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// A top-level page load.
    Navigate,
    /// Any other request: scripts, images, API calls.
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path plus query, relative to the app origin.
    pub path: String,
    pub mode: RequestMode,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".into(),
            path: path.into(),
            mode: RequestMode::Fetch,
        }
    }

    pub fn navigate(path: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(path)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Built by the worker when neither network nor cache could answer.
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub(crate) fn from_cache(mut self) -> Self {
        self.source = ResponseSource::Cache;
        self
    }

    /// The structured 503 returned when a resource cannot be served at all.
    pub fn offline(path: &str, message: &str) -> Self {
        let body = serde_json::json!({
            "error": "offline",
            "offline": true,
            "message": message,
            "path": path,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        Self {
            status: 503,
            content_type: Some("application/json".into()),
            body: body.to_string().into_bytes(),
            source: ResponseSource::Offline,
        }
    }
}

/// The network as seen from the worker.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// `Err` means no response at all (offline, DNS, reset). HTTP error
    /// statuses come back as `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, CourierError>;
}

/// [`Fetcher`] backed by reqwest against a fixed origin.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: String,
}

impl HttpFetcher {
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CourierError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            origin: origin.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, CourierError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| CourierError::Codec(format!("bad method `{}`: {e}", request.method)))?;
        let url = format!("{}{}", self.origin, request.path);
        let response = self
            .client
            .request(method, &url)
            .send()
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("fetch {url} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| CourierError::Transport {
            message: format!("reading {url} failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(url = %url, status, bytes = body.len(), "fetched");
        Ok(Response {
            status,
            content_type,
            body: body.to_vec(),
            source: ResponseSource::Network,
        })
    }
}
