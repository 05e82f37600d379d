// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner of the single persistent channel.
//!
//! `connect()` spawns one driver task per identity. The driver walks the
//! ladder disconnected → connecting → connected → authenticated, pumps
//! frames while the link is up, and on failure retries with capped
//! exponential backoff until the attempt limit turns the channel terminal.
//! Connection errors never reach callers; they only show up in the
//! published [`Channel`] state.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_config::model::ConnectionConfig;
use courier_core::{
    Channel, ChannelState, CourierError, EventName, Identity, InboundEvent, TerminalReason,
    Transport, TransportLink,
};

use crate::backoff::Backoff;
use crate::codec::{self, Incoming};

const INBOUND_BUFFER: usize = 512;

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Bound on transport open plus the auth exchange.
    pub handshake_timeout: Duration,
    pub backoff: Backoff,
    pub outbound_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ConnectionConfig::default())
    }
}

impl From<&ConnectionConfig> for ConnectionSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            handshake_timeout: Duration::from_millis(config.handshake_timeout_ms),
            backoff: Backoff::new(
                Duration::from_millis(config.reconnect_base_delay_ms),
                Duration::from_millis(config.reconnect_max_delay_ms),
                config.max_reconnect_attempts,
            ),
            outbound_buffer: config.outbound_buffer.max(1),
        }
    }
}

struct Session {
    identity: Identity,
    cancel: CancellationToken,
    outbound: mpsc::Sender<String>,
    task: JoinHandle<()>,
}

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    settings: ConnectionSettings,
    state: Arc<watch::Sender<Channel>>,
    inbound: mpsc::Sender<InboundEvent>,
    session: Mutex<Option<Session>>,
}

impl ConnectionManager {
    /// Creates a manager and the receiver on which inbound events arrive.
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: ConnectionSettings,
    ) -> (Self, mpsc::Receiver<InboundEvent>) {
        let (inbound, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (state, _) = watch::channel(Channel::default());
        let manager = Self {
            transport,
            settings,
            state: Arc::new(state),
            inbound,
            session: Mutex::new(None),
        };
        (manager, inbound_rx)
    }

    /// Starts connecting as `identity`.
    ///
    /// A no-op while a session for the same identity is still live
    /// (connecting, connected, authenticated or waiting to retry). A
    /// different identity tears the current session down first. A session
    /// that ended terminally is restarted.
    pub fn connect(&self, identity: Identity) {
        let mut session = self.lock_session();
        if let Some(current) = session.as_ref()
            && current.identity == identity
            && !current.task.is_finished()
        {
            debug!(user_id = %identity.user_id, "connect ignored, session already live");
            return;
        }
        if let Some(old) = session.take() {
            info!(user_id = %old.identity.user_id, "replacing channel session");
            old.cancel.cancel();
        }

        self.state.send_replace(Channel {
            identity: Some(identity.clone()),
            ..Channel::default()
        });

        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::channel(self.settings.outbound_buffer);
        let driver = Driver {
            transport: Arc::clone(&self.transport),
            settings: self.settings.clone(),
            identity: identity.clone(),
            state: Arc::clone(&self.state),
            inbound: self.inbound.clone(),
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        info!(user_id = %identity.user_id, role = %identity.role, "channel connect requested");
        let task = tokio::spawn(driver.run());
        *session = Some(Session {
            identity,
            cancel,
            outbound,
            task,
        });
    }

    /// Tears the session down and resets the attempt counter. Idempotent.
    pub fn disconnect(&self) {
        if let Some(session) = self.lock_session().take() {
            session.cancel.cancel();
            info!(user_id = %session.identity.user_id, "channel disconnected");
        }
        self.reset_state();
    }

    /// Like [`disconnect`](Self::disconnect) but waits for the driver to close its link.
    pub async fn shutdown(&self) {
        let session = self.lock_session().take();
        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.task.await
                && !e.is_cancelled()
            {
                warn!(error = %e, "channel driver ended abnormally");
            }
        }
        self.reset_state();
    }

    /// Sends an event if the channel is authenticated; otherwise logs and drops it.
    ///
    /// Nothing is queued for later. Returns whether the frame was handed to the link.
    pub fn emit(&self, name: EventName, payload: serde_json::Value) -> bool {
        if !self.is_authenticated() {
            debug!(event = %name, "channel not authenticated, emit dropped");
            return false;
        }
        let frame = match codec::encode(&name.to_string(), payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = %name, error = %e, "emit dropped, payload not encodable");
                return false;
            }
        };
        let session = self.lock_session();
        let Some(session) = session.as_ref() else {
            return false;
        };
        match session.outbound.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(event = %name, error = %e, "emit dropped, outbound buffer unavailable");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Snapshot of the channel.
    pub fn channel(&self) -> Channel {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<Channel> {
        self.state.subscribe()
    }

    fn reset_state(&self) {
        self.state.send_if_modified(|channel| {
            let fresh = Channel::default();
            let changed = *channel != fresh;
            *channel = fresh;
            changed
        });
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(session) = self.lock_session().take() {
            session.cancel.cancel();
        }
    }
}

enum LinkEnd {
    Stopped,
    Lost(String),
    Revoked(String),
}

struct Driver {
    transport: Arc<dyn Transport>,
    settings: ConnectionSettings,
    identity: Identity,
    state: Arc<watch::Sender<Channel>>,
    inbound: mpsc::Sender<InboundEvent>,
    outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let mut failures: u32 = 0;
        loop {
            self.set_state(ChannelState::Connecting, failures);
            let attempt = tokio::time::timeout(
                self.settings.handshake_timeout,
                self.handshake(failures),
            );
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return,
                outcome = attempt => outcome,
            };

            match outcome {
                Ok(Ok(link)) => {
                    failures = 0;
                    match self.serve(link).await {
                        LinkEnd::Stopped => return,
                        LinkEnd::Lost(reason) => {
                            warn!(user_id = %self.identity.user_id, %reason, "channel lost");
                            // Emits aimed at the dead link are not replayed.
                            while self.outbound.try_recv().is_ok() {}
                        }
                        LinkEnd::Revoked(reason) => {
                            warn!(user_id = %self.identity.user_id, %reason, "session revoked");
                            self.finish(TerminalReason::AuthRejected, failures);
                            return;
                        }
                    }
                }
                Ok(Err(CourierError::Auth(reason))) => {
                    warn!(user_id = %self.identity.user_id, %reason, "handshake rejected");
                    self.finish(TerminalReason::AuthRejected, failures);
                    return;
                }
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(error = %e, attempt = failures, "channel attempt failed");
                }
                Err(_) => {
                    failures += 1;
                    warn!(
                        timeout_ms = self.settings.handshake_timeout.as_millis() as u64,
                        attempt = failures,
                        "channel handshake timed out"
                    );
                }
            }

            if self.settings.backoff.exhausted(failures) {
                warn!(attempts = failures, "reconnect attempts exhausted, channel unreachable");
                self.finish(TerminalReason::Unreachable, failures);
                return;
            }

            self.set_state(ChannelState::Disconnected, failures);
            let delay = self.settings.backoff.delay(failures.saturating_sub(1));
            info!(delay_ms = delay.as_millis() as u64, attempt = failures + 1, "reconnecting");
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn handshake(&self, failures: u32) -> Result<Box<dyn TransportLink>, CourierError> {
        let mut link = self.transport.open().await?;
        self.set_state(ChannelState::Connected, failures);
        link.send(codec::encode_auth(&self.identity)?).await?;

        loop {
            let text = match link.recv().await {
                Some(Ok(text)) => text,
                Some(Err(e)) => return Err(e),
                None => return Err(CourierError::transport("link closed during handshake")),
            };
            match codec::decode(&text) {
                Ok(Incoming::AuthOk) => break,
                Ok(Incoming::AuthError(reason)) => {
                    link.close().await;
                    return Err(CourierError::Auth(reason));
                }
                Ok(Incoming::Ping) => link.send(codec::encode_pong()?).await?,
                Ok(_) => debug!("frame before auth-ok ignored"),
                Err(e) => warn!(error = %e, "malformed frame during handshake"),
            }
        }

        self.set_state(ChannelState::Authenticated, 0);
        info!(user_id = %self.identity.user_id, "channel authenticated");
        Ok(link)
    }

    async fn serve(&mut self, mut link: Box<dyn TransportLink>) -> LinkEnd {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    link.close().await;
                    return LinkEnd::Stopped;
                }
                frame = self.outbound.recv() => {
                    let Some(frame) = frame else {
                        link.close().await;
                        return LinkEnd::Stopped;
                    };
                    if let Err(e) = link.send(frame).await {
                        return LinkEnd::Lost(e.to_string());
                    }
                }
                incoming = link.recv() => {
                    let text = match incoming {
                        Some(Ok(text)) => text,
                        Some(Err(e)) => return LinkEnd::Lost(e.to_string()),
                        None => return LinkEnd::Lost("closed by peer".to_string()),
                    };
                    match codec::decode(&text) {
                        Ok(Incoming::Event(event)) => {
                            if self.inbound.send(event).await.is_err() {
                                link.close().await;
                                return LinkEnd::Stopped;
                            }
                        }
                        Ok(Incoming::Ping) => {
                            if let Ok(pong) = codec::encode_pong()
                                && let Err(e) = link.send(pong).await
                            {
                                return LinkEnd::Lost(e.to_string());
                            }
                        }
                        Ok(Incoming::AuthError(reason)) => {
                            link.close().await;
                            return LinkEnd::Revoked(reason);
                        }
                        Ok(Incoming::AuthOk | Incoming::Pong) => {}
                        Err(e) => warn!(error = %e, "dropping malformed frame"),
                    }
                }
            }
        }
    }

    fn set_state(&self, next: ChannelState, attempt: u32) {
        let cancel = &self.cancel;
        self.state.send_if_modified(|channel| {
            if cancel.is_cancelled() {
                return false;
            }
            if channel.state != next && !channel.state.can_transition_to(next) {
                warn!(from = %channel.state, to = %next, "illegal channel transition skipped");
                return false;
            }
            let changed = channel.state != next || channel.reconnect_attempt != attempt;
            if channel.state != next {
                debug!(from = %channel.state, to = %next, attempt, "channel state");
            }
            channel.state = next;
            channel.reconnect_attempt = attempt;
            changed
        });
    }

    fn finish(&self, reason: TerminalReason, attempt: u32) {
        let cancel = &self.cancel;
        self.state.send_if_modified(|channel| {
            if cancel.is_cancelled() {
                return false;
            }
            channel.state = ChannelState::Disconnected;
            channel.reconnect_attempt = attempt;
            channel.terminal = Some(reason);
            true
        });
    }
}
