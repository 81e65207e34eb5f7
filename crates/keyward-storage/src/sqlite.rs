// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed document store.
//!
//! All statements run on `tokio-rusqlite`'s single background thread, which
//! serializes writes. Do NOT open a second connection for writes.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use keyward_core::{DocumentStore, KeywardError};

use crate::migrations::run_migrations;

/// One named JSON document stored as a row of the `documents` table.
pub struct SqliteDocumentStore {
    conn: tokio_rusqlite::Connection,
    document_name: String,
}

impl std::fmt::Debug for SqliteDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDocumentStore")
            .field("document_name", &self.document_name)
            .finish()
    }
}

impl SqliteDocumentStore {
    /// Open (creating if needed) the database at `path`, run migrations, and
    /// bind the store to the row named `document_name`.
    pub async fn open(path: &str, document_name: &str) -> Result<Self, KeywardError> {
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), KeywardError> {
            if let Some(parent) = Path::new(&migrate_path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).map_err(storage_err)?;
            }
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            run_migrations(&mut conn).map_err(storage_err)?;
            Ok(())
        })
        .await
        .map_err(|e| KeywardError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(storage_err)?;
        debug!(path = %path, document = %document_name, "sqlite document store opened");

        Ok(Self {
            conn,
            document_name: document_name.to_string(),
        })
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self) -> Result<Option<serde_json::Value>, KeywardError> {
        let name = self.document_name.clone();
        let body = self
            .conn
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT body FROM documents WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;

        body.map(|body| serde_json::from_str(&body).map_err(storage_err))
            .transpose()
    }

    async fn save(&self, document: &serde_json::Value) -> Result<(), KeywardError> {
        let name = self.document_name.clone();
        let body = serde_json::to_string(document).map_err(storage_err)?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO documents (name, body, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                    params![name, body, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> KeywardError {
    KeywardError::Storage {
        source: Box::new(e),
    }
}

/// Convert tokio-rusqlite errors to `KeywardError::Storage`.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> KeywardError {
    KeywardError::Storage {
        source: format!("sqlite document store: {e}").into(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn fresh_database_has_no_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let store = SqliteDocumentStore::open(path.to_str().unwrap(), "host")
            .await
            .unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn document_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("reopen.db");
        let path = path.to_str().unwrap();

        let store = SqliteDocumentStore::open(path, "host").await.unwrap();
        store
            .save(&json!({"keyward_vault": {"version": 1}, "theme": "dark"}))
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteDocumentStore::open(path, "host").await.unwrap();
        let doc = reopened.load().await.unwrap().unwrap();
        assert_eq!(doc["theme"], "dark");
        assert_eq!(doc["keyward_vault"]["version"], 1);
    }

    #[tokio::test]
    async fn save_overwrites_whole_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overwrite.db");
        let store = SqliteDocumentStore::open(path.to_str().unwrap(), "host")
            .await
            .unwrap();

        store.save(&json!({"a": 1, "b": 2})).await.unwrap();
        store.save(&json!({"a": 3})).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(json!({"a": 3})));
    }

    #[tokio::test]
    async fn documents_are_isolated_by_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("names.db");
        let path = path.to_str().unwrap();

        let first = SqliteDocumentStore::open(path, "first").await.unwrap();
        first.save(&json!({"owner": "first"})).await.unwrap();

        let second = SqliteDocumentStore::open(path, "second").await.unwrap();
        assert!(second.load().await.unwrap().is_none());
        assert_eq!(second.document_name(), "second");
    }
}
