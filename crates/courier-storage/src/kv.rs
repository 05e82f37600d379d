// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`KeyValueStore`].
//!
//! All statements run on tokio-rusqlite's single background thread, which
//! also serializes writes.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use courier_core::{CourierError, KeyValueStore};

use crate::migrations::run_migrations;

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CourierError {
    CourierError::Storage {
        source: Box::new(e),
    }
}

pub struct SqliteKv {
    conn: tokio_rusqlite::Connection,
}

impl SqliteKv {
    /// Opens (creating if needed) the database at `path` and migrates it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CourierError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CourierError::Storage {
                source: Box::new(e),
            })?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| CourierError::Storage {
                source: Box::new(e),
            })?;
        let store = Self::prepare(conn, true).await?;
        debug!(path = %path.display(), "offline cache opened");
        Ok(store)
    }

    /// A migrated, process-local database. Used by tests and the CLI dry runs.
    pub async fn open_in_memory() -> Result<Self, CourierError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| CourierError::Storage {
                source: Box::new(e),
            })?;
        Self::prepare(conn, false).await
    }

    async fn prepare(conn: tokio_rusqlite::Connection, wal: bool) -> Result<Self, CourierError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), CourierError> { run_migrations(conn) })
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => CourierError::Storage {
                    source: Box::new(other),
                },
            })?;

        Ok(Self { conn })
    }

    /// Every key currently stored, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, CourierError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CourierError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT value FROM kv_store WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CourierError> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn remove(&self, key: &str) -> Result<(), CourierError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let kv = SqliteKv::open_in_memory().await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);

        kv.set("a", "1").await.unwrap();
        kv.set("a", "2").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("2"));

        kv.remove("a").await.unwrap();
        kv.remove("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_are_listed_in_order() {
        let kv = SqliteKv::open_in_memory().await.unwrap();
        kv.set("b", "x").await.unwrap();
        kv.set("a", "y").await.unwrap();
        assert_eq!(kv.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("offline.db");
        {
            let kv = SqliteKv::open(&path).await.unwrap();
            kv.set("k", "v").await.unwrap();
        }
        let kv = SqliteKv::open(&path).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
