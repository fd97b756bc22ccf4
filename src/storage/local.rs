use super::{validate_table_key, BlobStore, TableStore};
use crate::errors::{AppError, AppResult};
use crate::models::TableRow;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Blob container backed by a directory: `<root>/<container>/<blob name>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: &Path, container: &str) -> Self {
        Self {
            dir: root.join(container),
        }
    }

    /// Resolves a blob name to a path inside the container directory.
    ///
    /// Names may contain `/` to form virtual directories but may not escape
    /// the container.
    fn blob_path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let contained = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.dir.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn read_text(&self, name: &str) -> AppResult<String> {
        let path = self.blob_path(name).ok_or_else(|| {
            AppError::SourceUnavailable(format!("invalid blob name '{name}'"))
        })?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::SourceUnavailable(format!("{}: {e}", path.display())))
    }

    async fn upload(&self, name: &str, body: &str, overwrite: bool) -> AppResult<()> {
        let path = self
            .blob_path(name)
            .ok_or_else(|| AppError::SinkUnavailable(format!("invalid blob name '{name}'")))?;
        let body = body.to_owned();

        run_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let written = if overwrite {
                std::fs::write(&path, body)
            } else {
                write_new(&path, body.as_bytes())
            };
            written.map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    std::io::Error::new(e.kind(), format!("blob {} already exists", path.display()))
                }
                _ => e,
            })
        })
        .await
        .map_err(|e| AppError::SinkUnavailable(format!("blob '{name}': {e}")))?;

        debug!(blob = name, overwrite, "Wrote local blob");
        Ok(())
    }
}

/// Table backed by a directory: one JSON file per row at
/// `<root>/<table>/<PartitionKey>/<RowKey>.json`.
#[derive(Debug, Clone)]
pub struct LocalTableStore {
    dir: PathBuf,
}

impl LocalTableStore {
    pub fn new(root: &Path, table: &str) -> Self {
        Self {
            dir: root.join(table),
        }
    }

    pub fn row_path(&self, partition: &str, row: &str) -> PathBuf {
        self.dir.join(partition).join(format!("{row}.json"))
    }
}

#[async_trait]
impl TableStore for LocalTableStore {
    async fn create_entity(&self, row: &TableRow) -> AppResult<()> {
        validate_table_key(&row.partition_key)?;
        validate_table_key(&row.row_key)?;

        let path = self.row_path(&row.partition_key, &row.row_key);
        let body = serde_json::to_vec_pretty(row)
            .map_err(|e| AppError::SinkUnavailable(format!("Failed to encode row: {e}")))?;

        let result = run_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_new(&path, &body)
        })
        .await;

        match result {
            Ok(()) => {
                debug!(
                    partition = %row.partition_key,
                    row = %row.row_key,
                    "Wrote local table row"
                );
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(AppError::DuplicateKey {
                partition: row.partition_key.clone(),
                row: row.row_key.clone(),
            }),
            Err(e) => Err(AppError::SinkUnavailable(format!(
                "table row {}/{}: {e}",
                row.partition_key, row.row_key
            ))),
        }
    }
}

fn write_new(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(body)
}

// Filesystem writes run on the blocking pool, as the runtime is current-thread
async fn run_blocking<F>(task: F) -> std::io::Result<()>
where
    F: FnOnce() -> std::io::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| std::io::Error::new(ErrorKind::Other, format!("Task join error: {e}")))?
}
