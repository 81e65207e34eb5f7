// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document persistence backends for the Keyward credential vault.
//!
//! Both backends implement [`DocumentStore`]: a single named JSON document
//! loaded and saved whole.
//!
//! - [`SqliteDocumentStore`]: one row per document in SQLite, with embedded
//!   migrations and a single-writer model via `tokio-rusqlite`.
//! - [`MemoryDocumentStore`]: in-process, for tests and ephemeral hosts.

pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;

use keyward_config::model::{StorageBackend, StorageConfig};
use keyward_core::{DocumentStore, KeywardError};

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Open the backend selected by `config`.
pub async fn open_document_store(
    config: &StorageConfig,
) -> Result<Arc<dyn DocumentStore>, KeywardError> {
    match config.backend {
        StorageBackend::Sqlite => {
            let store =
                SqliteDocumentStore::open(&config.database_path, &config.document_name).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
    }
}
