use crate::errors::{AppError, AppResult};
use crate::models::{ExtractedEvent, FailurePolicy, RawFragment, SaleEvent};
use crate::storage::{BlobStore, TableStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An event whose table row or archive blob could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEvent {
    pub transaction_id: String,
    pub error: String,
}

/// Outcome of a publishing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Events whose row and blob were both written
    pub published: usize,
    pub failed: Vec<FailedEvent>,
}

impl PublishReport {
    pub fn failed_transaction_ids(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|failed| failed.transaction_id.clone())
            .collect()
    }

    /// Turns a report with failures into `PublishIncomplete`.
    pub fn into_result(self) -> AppResult<usize> {
        if self.failed.is_empty() {
            Ok(self.published)
        } else {
            Err(AppError::PublishIncomplete {
                failed: self.failed_transaction_ids(),
            })
        }
    }
}

/// Writes each extracted event to the table sink and its fragment to the blob
/// sink, one event at a time, in input order.
///
/// The two writes for an event are independent: no transaction spans them and
/// neither is rolled back when the other fails.
pub struct EventPublisher {
    table: Arc<dyn TableStore>,
    archive: Arc<dyn BlobStore>,
    policy: FailurePolicy,
}

impl EventPublisher {
    pub fn new(
        table: Arc<dyn TableStore>,
        archive: Arc<dyn BlobStore>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            table,
            archive,
            policy,
        }
    }

    /// Creates the summary row. Fails with `DuplicateKey` when the row exists.
    pub async fn write_summary(&self, event: &SaleEvent) -> AppResult<()> {
        self.table.create_entity(&event.to_row()).await
    }

    /// Uploads the fragment under the event's archive name, replacing any
    /// existing blob.
    pub async fn archive_fragment(
        &self,
        event: &SaleEvent,
        fragment: &RawFragment,
    ) -> AppResult<()> {
        self.archive
            .upload(&event.archive_blob_name, fragment.as_str(), true)
            .await
    }

    /// Publishes every event.
    ///
    /// With `FailurePolicy::FailFast` the first failed write is returned as the
    /// error; earlier events stay written and later ones are not attempted.
    /// With `FailurePolicy::Continue` both writes are attempted for every
    /// event and failures are collected in the report.
    pub async fn publish(&self, events: &[ExtractedEvent]) -> AppResult<PublishReport> {
        info!(
            events = events.len(),
            policy = ?self.policy,
            "Starting publishing"
        );

        let mut report = PublishReport::default();
        for extracted in events {
            let event = &extracted.event;
            match self.policy {
                FailurePolicy::FailFast => {
                    self.publish_one(extracted).await.map_err(|e| {
                        warn!(
                            transaction_id = %event.transaction_id,
                            published = report.published,
                            error = %e,
                            "Publishing aborted"
                        );
                        e
                    })?;
                    report.published += 1;
                }
                FailurePolicy::Continue => {
                    let table = self.write_summary(event).await;
                    let blob = self.archive_fragment(event, &extracted.fragment).await;

                    let errors: Vec<String> = [table.err(), blob.err()]
                        .into_iter()
                        .flatten()
                        .map(|e| e.to_string())
                        .collect();
                    if errors.is_empty() {
                        report.published += 1;
                    } else {
                        let error = errors.join("; ");
                        warn!(
                            transaction_id = %event.transaction_id,
                            error = %error,
                            "Sale event not fully published"
                        );
                        report.failed.push(FailedEvent {
                            transaction_id: event.transaction_id.clone(),
                            error,
                        });
                    }
                }
            }
        }

        info!(
            published = report.published,
            failed = report.failed.len(),
            "Publishing finished"
        );
        Ok(report)
    }

    async fn publish_one(&self, extracted: &ExtractedEvent) -> AppResult<()> {
        let event = &extracted.event;
        self.write_summary(event).await?;
        self.archive_fragment(event, &extracted.fragment).await?;
        debug!(
            transaction_id = %event.transaction_id,
            blob = %event.archive_blob_name,
            "Published sale event"
        );
        Ok(())
    }
}
