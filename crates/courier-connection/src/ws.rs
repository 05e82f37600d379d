// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use courier_core::{CourierError, Transport, TransportLink};

fn ws_error(context: &str, e: tokio_tungstenite::tungstenite::Error) -> CourierError {
    CourierError::Transport {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Opens a fresh WebSocket per link.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<Box<dyn TransportLink>, CourierError> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ws_error("websocket connect", e))?;
        debug!(url = %self.url, status = %response.status(), "websocket open");
        Ok(Box::new(WsLink { stream }))
    }
}

struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportLink for WsLink {
    async fn send(&mut self, frame: String) -> Result<(), CourierError> {
        self.stream
            .send(Message::text(frame))
            .await
            .map_err(|e| ws_error("websocket send", e))
    }

    async fn recv(&mut self) -> Option<Result<String, CourierError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => return None,
                // Control frames are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(ws_error("websocket receive", e))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
