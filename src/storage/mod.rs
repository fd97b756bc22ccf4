//! Keyed storage services the pipeline reads from and writes to.
//!
//! The pipeline only sees the [`BlobStore`] and [`TableStore`] traits. Concrete
//! backends are picked from the connection identity by [`open_blob_store`] and
//! [`open_table_store`].

mod connection;
mod http;
mod local;
mod memory;
mod shared_key;

use crate::errors::{AppError, AppResult};
use crate::models::TableRow;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use connection::{parse_connection, Credential, ServiceKind, StorageEndpoint};
pub use http::{HttpBlobStore, HttpTableStore};
pub use local::{LocalBlobStore, LocalTableStore};
pub use memory::{MemoryBlobStore, MemoryTableStore};
pub use shared_key::SharedKeyCredential;

/// One blob container.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Reads the named blob as UTF-8 text.
    ///
    /// Fails with `SourceUnavailable` when the blob is missing or unreadable.
    async fn read_text(&self, name: &str) -> AppResult<String>;

    /// Writes `body` under `name`. With `overwrite` off an existing blob is an
    /// error; with it on the blob is replaced.
    async fn upload(&self, name: &str, body: &str, overwrite: bool) -> AppResult<()>;
}

/// One table.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Inserts a new entity. An existing row with the same key is a
    /// `DuplicateKey` error; the stored row is left untouched.
    async fn create_entity(&self, row: &TableRow) -> AppResult<()>;
}

/// Opens the container `container` on the blob service named by `connection`.
pub fn open_blob_store(
    connection: &str,
    container: &str,
    client: &reqwest::Client,
) -> AppResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match parse_connection(connection, ServiceKind::Blob)? {
        StorageEndpoint::Local(root) => Arc::new(LocalBlobStore::new(&root, container)),
        StorageEndpoint::Remote {
            endpoint,
            credential,
        } => Arc::new(HttpBlobStore::new(
            client.clone(),
            &endpoint,
            container,
            credential,
        )?),
    };
    Ok(store)
}

/// Opens the table `table` on the table service named by `connection`.
pub fn open_table_store(
    connection: &str,
    table: &str,
    client: &reqwest::Client,
) -> AppResult<Arc<dyn TableStore>> {
    let store: Arc<dyn TableStore> = match parse_connection(connection, ServiceKind::Table)? {
        StorageEndpoint::Local(root) => Arc::new(LocalTableStore::new(&root, table)),
        StorageEndpoint::Remote {
            endpoint,
            credential,
        } => Arc::new(HttpTableStore::new(
            client.clone(),
            &endpoint,
            table,
            credential,
        )?),
    };
    Ok(store)
}

/// Builds the HTTP client shared by the REST backends.
pub fn http_client(timeout_secs: u64) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::InvalidConfig(format!("Failed to build HTTP client: {e}")))
}

/// Rejects keys the table service refuses: `/`, `\`, `#`, `?`, control
/// characters, or more than 1 KiB.
pub fn validate_table_key(key: &str) -> AppResult<()> {
    if key.len() > 1024 {
        return Err(AppError::SinkUnavailable(format!(
            "table key is {} bytes, limit is 1024",
            key.len()
        )));
    }
    if let Some(bad) = key
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(AppError::SinkUnavailable(format!(
            "table key '{}' contains disallowed character {bad:?}",
            key.escape_debug()
        )));
    }
    Ok(())
}
