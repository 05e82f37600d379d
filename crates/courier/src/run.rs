// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier run`: the sync core over the real channel, backend and cache.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use courier_config::CourierConfig;
use courier_core::{CourierError, Identity};
use courier_storage::SqliteKv;
use courier_sync::{SyncCore, SyncUpdate};

use crate::shutdown;

pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Runs until SIGINT/SIGTERM, then drains the core and flushes the cache.
pub async fn run_sync(config: CourierConfig, identity: Identity) -> Result<(), CourierError> {
    let kv = SqliteKv::open(&config.cache.database_path).await?;
    let core = SyncCore::builder(identity)
        .config(config)
        .store(Arc::new(kv))
        .build()?;

    let cancel = shutdown::install_signal_handler();
    let mut updates = core.subscribe_updates();
    let mut channel = core.connection().watch_state();

    core.start().await?;
    info!(
        user = %core.identity().user_id,
        role = %core.identity().role,
        "courier running"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = channel.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = channel.borrow_and_update().clone();
                info!(
                    state = %current.state,
                    attempt = current.reconnect_attempt,
                    terminal = ?current.terminal,
                    "channel state"
                );
            }
            update = updates.recv() => match update {
                Ok(update) => log_update(&core, &update),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "update stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    core.shutdown().await;
    info!("courier stopped");
    Ok(())
}

fn log_update(core: &SyncCore, update: &SyncUpdate) {
    match update {
        SyncUpdate::Conversations => info!(
            conversations = core.conversations().len(),
            unread = core.total_unread(),
            "conversations changed"
        ),
        SyncUpdate::Messages { conversation_id } => {
            let messages = core.messages(conversation_id);
            match messages.last() {
                Some(last) => info!(
                    conversation_id = %conversation_id,
                    count = messages.len(),
                    from = %last.sender_role,
                    state = %last.delivery_state,
                    body = %last.body,
                    "messages changed"
                ),
                None => info!(conversation_id = %conversation_id, "messages cleared"),
            }
        }
        SyncUpdate::Typing {
            conversation_id,
            typing,
        } => info!(conversation_id = %conversation_id, typing, "typing"),
    }
}
