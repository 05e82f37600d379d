// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background tasks owned by a started core.
//!
//! Tasks hold a `Weak` handle so a dropped core ends them even without an
//! explicit shutdown.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use courier_core::{Channel, ChannelState, EventSource, InboundEvent, SideEffect, SideEffectSink};

use crate::core::{Inner, SyncCore};

/// Drains the connection's inbound queue into the core.
pub(crate) async fn pump(
    core: Weak<Inner>,
    mut inbound: mpsc::Receiver<InboundEvent>,
    cancel: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            next = inbound.recv() => match next {
                Some(raw) => raw,
                None => break,
            },
        };
        let Some(inner) = core.upgrade() else { break };
        if let Err(e) = SyncCore::from_inner(inner).ingest(&raw, EventSource::Channel) {
            warn!(event = %raw.name, error = %e, "dropping undecodable event");
        }
    }
    debug!("inbound pump stopped");
}

/// Polls message history while the channel is not authenticated, or on
/// every tick when configured to always poll.
pub(crate) async fn poll(core: Weak<Inner>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = core.upgrade() else { break };
        let core = SyncCore::from_inner(inner);
        if !core.inner.settings.poll_always && core.inner.connection.is_authenticated() {
            trace!("channel live, poll skipped");
            continue;
        }
        match core.poll_once().await {
            Ok(0) => trace!("poll found nothing new"),
            Ok(n) => debug!(new = n, "poll caught up"),
            Err(e) => debug!(error = %e, "poll failed"),
        }
    }
    debug!("poller stopped");
}

/// Edge detector for the persistent offline indicator.
///
/// Raised once when a signed-in channel drops after having been online, or
/// ends terminally; cleared once on re-authentication or sign-out.
#[derive(Debug, Default)]
pub struct OfflineTracker {
    was_online: bool,
    visible: bool,
}

impl OfflineTracker {
    /// Returns the new indicator state when it changes.
    pub fn observe(&mut self, channel: &Channel) -> Option<bool> {
        if channel.identity.is_none() {
            self.was_online = false;
            return self.set(false);
        }
        if channel.is_authenticated() {
            self.was_online = true;
            return self.set(false);
        }
        let dropped = self.was_online
            && matches!(channel.state, ChannelState::Disconnected | ChannelState::Connecting);
        if dropped || channel.terminal.is_some() {
            return self.set(true);
        }
        None
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    fn set(&mut self, visible: bool) -> Option<bool> {
        (self.visible != visible).then(|| {
            self.visible = visible;
            visible
        })
    }
}

pub(crate) async fn offline_indicator(
    mut state: watch::Receiver<Channel>,
    effects: Arc<dyn SideEffectSink>,
    cancel: CancellationToken,
) {
    let mut tracker = OfflineTracker::default();
    loop {
        let change = {
            let channel = state.borrow_and_update();
            tracker.observe(&channel)
        };
        if let Some(visible) = change {
            effects.dispatch(SideEffect::OfflineIndicator { visible });
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = state.changed() => if changed.is_err() { break },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Identity, Role, TerminalReason};

    fn channel(state: ChannelState) -> Channel {
        Channel {
            identity: Some(Identity::new("d1", Role::Driver)),
            state,
            ..Channel::default()
        }
    }

    #[test]
    fn raised_once_after_being_online_and_cleared_once() {
        let mut t = OfflineTracker::default();
        assert_eq!(t.observe(&channel(ChannelState::Connecting)), None);
        assert_eq!(t.observe(&channel(ChannelState::Authenticated)), None);
        assert_eq!(t.observe(&channel(ChannelState::Disconnected)), Some(true));
        assert_eq!(t.observe(&channel(ChannelState::Connecting)), None);
        assert_eq!(t.observe(&channel(ChannelState::Connected)), None);
        assert_eq!(t.observe(&channel(ChannelState::Authenticated)), Some(false));
        assert_eq!(t.observe(&channel(ChannelState::Authenticated)), None);
    }

    #[test]
    fn terminal_failure_raises_without_prior_session() {
        let mut t = OfflineTracker::default();
        let mut failed = channel(ChannelState::Disconnected);
        failed.terminal = Some(TerminalReason::Unreachable);
        assert_eq!(t.observe(&failed), Some(true));
        assert!(t.is_visible());
    }

    #[test]
    fn sign_out_clears_without_raising() {
        let mut t = OfflineTracker::default();
        t.observe(&channel(ChannelState::Authenticated));
        assert_eq!(t.observe(&Channel::default()), None);
        let mut failed = channel(ChannelState::Disconnected);
        failed.terminal = Some(TerminalReason::AuthRejected);
        assert_eq!(t.observe(&failed), Some(true));
        assert_eq!(t.observe(&Channel::default()), Some(false));
    }
}
