use crate::errors::{AppError, AppResult};
use crate::storage::BlobStore;
use std::sync::Arc;
use tracing::info;

/// Reads the source document from a blob container.
pub struct DocumentLoader {
    store: Arc<dyn BlobStore>,
    blob_name: String,
}

impl DocumentLoader {
    pub fn new(store: Arc<dyn BlobStore>, blob_name: impl Into<String>) -> Self {
        Self {
            store,
            blob_name: blob_name.into(),
        }
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }

    /// Returns the whole blob as text.
    ///
    /// # Errors
    ///
    /// Any failure to read the blob is reported as `SourceUnavailable`.
    pub async fn load(&self) -> AppResult<String> {
        info!(blob = %self.blob_name, "Loading source document");

        let text = self
            .store
            .read_text(&self.blob_name)
            .await
            .map_err(|e| match e {
                AppError::SourceUnavailable(_) => e,
                other => AppError::SourceUnavailable(other.to_string()),
            })?;

        info!(blob = %self.blob_name, bytes = text.len(), "Loaded source document");
        Ok(text)
    }
}
