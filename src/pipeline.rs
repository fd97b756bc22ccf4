use crate::config::PipelineConfig;
use crate::errors::AppResult;
use crate::extractor::extract;
use crate::loader::DocumentLoader;
use crate::publisher::{EventPublisher, PublishReport};
use crate::storage::{http_client, open_blob_store, open_table_store};
use crate::utils::format_duration;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Load, extract, publish. Runs strictly in sequence.
pub struct Pipeline {
    loader: DocumentLoader,
    publisher: EventPublisher,
}

impl Pipeline {
    pub fn new(loader: DocumentLoader, publisher: EventPublisher) -> Self {
        Self { loader, publisher }
    }

    /// Opens the stores named by `config` and wires the components.
    ///
    /// When the archive container is the source container the same store
    /// handle serves both.
    pub fn from_config(config: &PipelineConfig) -> AppResult<Self> {
        let client = http_client(config.request_timeout_secs)?;

        let source = open_blob_store(&config.blob_connection, &config.container, &client)?;
        let archive = if config.archive_container() == config.container {
            Arc::clone(&source)
        } else {
            open_blob_store(&config.blob_connection, config.archive_container(), &client)?
        };
        let table = open_table_store(&config.table_connection, &config.table_name, &client)?;

        info!(
            container = %config.container,
            blob = %config.blob_name,
            table = %config.table_name,
            archive_container = %config.archive_container(),
            policy = ?config.on_error,
            "Pipeline configured"
        );

        Ok(Self::new(
            DocumentLoader::new(source, config.blob_name.clone()),
            EventPublisher::new(table, archive, config.on_error),
        ))
    }

    /// Runs one batch.
    ///
    /// Loader and extractor failures abort before any write. Publisher
    /// failures follow the configured failure policy.
    pub async fn run(&self) -> AppResult<PublishReport> {
        let started = Instant::now();

        let xml = self.loader.load().await?;
        let events = extract(&xml)?;
        let report = self.publisher.publish(&events).await?;

        info!(
            blob = %self.loader.blob_name(),
            extracted = events.len(),
            published = report.published,
            failed = report.failed.len(),
            elapsed = %format_duration(started.elapsed()),
            "Batch processed"
        );
        Ok(report)
    }
}
