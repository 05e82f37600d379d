// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier cache show`.

use std::fmt::Write;
use std::sync::Arc;

use courier_config::CourierConfig;
use courier_core::{ConversationSnapshot, CourierError};
use courier_storage::{OfflineCache, SqliteKv};

pub async fn show(config: &CourierConfig) -> Result<(), CourierError> {
    match load(config).await? {
        Some(snapshot) => print!("{}", render(&snapshot)),
        None => println!("no active conversation cached"),
    }
    Ok(())
}

async fn load(config: &CourierConfig) -> Result<Option<ConversationSnapshot>, CourierError> {
    let kv = SqliteKv::open(&config.cache.database_path).await?;
    let (cache, _writer) = OfflineCache::spawn(Arc::new(kv), config.cache.write_buffer);
    cache.load_last_active().await
}

fn render(snapshot: &ConversationSnapshot) -> String {
    let c = &snapshot.conversation;
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "  conversation {}", c.id);
    let _ = writeln!(out, "  {}", "-".repeat(35));
    let _ = writeln!(out, "    With:     {} ({})", c.counterparty_name, c.counterparty_id);
    let _ = writeln!(out, "    Status:   {}", c.status);
    let _ = writeln!(out, "    Unread:   {}", c.unread_count);
    let _ = writeln!(out, "    Messages: {}", snapshot.messages.len());
    let _ = writeln!(out);
    for m in &snapshot.messages {
        let _ = writeln!(
            out,
            "    [{}] {:<5} {:<9} {}",
            m.sent_at.format("%Y-%m-%d %H:%M"),
            m.sender_role,
            m.delivery_state,
            m.body
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::KeyValueStore;

    fn config_at(path: &std::path::Path) -> CourierConfig {
        let mut config = CourierConfig::default();
        config.cache.database_path = path.display().to_string();
        config
    }

    #[tokio::test]
    async fn empty_cache_has_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_at(&dir.path().join("offline.db"));
        assert!(load(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_back_the_last_active_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.db");
        let config = config_at(&path);

        let snapshot: ConversationSnapshot = serde_json::from_value(serde_json::json!({
            "conversation": {
                "id": "c1",
                "counterparty_id": "d1",
                "counterparty_name": "Dana",
                "last_message": "hello",
                "last_message_at": null,
                "unread_count": 0,
                "status": "active",
                "priority": "normal",
                "assigned_agent_id": null
            },
            "messages": []
        }))
        .unwrap();
        {
            let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::open(&path).await.unwrap());
            let (cache, writer) = OfflineCache::spawn(kv, 8);
            cache.save_snapshot(&snapshot);
            cache.set_last_active(Some("c1"));
            cache.flush().await;
            drop(cache);
            writer.await.unwrap();
        }

        let loaded = load(&config).await.unwrap().unwrap();
        assert_eq!(loaded.conversation.counterparty_name, "Dana");
        let text = render(&loaded);
        assert!(text.contains("conversation c1"));
        assert!(text.contains("Dana (d1)"));
    }
}
