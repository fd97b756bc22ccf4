//! End-to-end tests over directory-backed stores

mod common;

use common::{
    create_test_xml_file, write_local_config, FailingBlobStore, SAMPLE_BATCH, SPARSE_EVENT_XML,
};
use saleevent_ingest::config::PipelineConfig;
use saleevent_ingest::errors::AppError;
use saleevent_ingest::extractor::extract;
use saleevent_ingest::loader::DocumentLoader;
use saleevent_ingest::models::{EventStatus, FailurePolicy, TableRow};
use saleevent_ingest::pipeline::Pipeline;
use saleevent_ingest::publisher::EventPublisher;
use saleevent_ingest::storage::{MemoryBlobStore, MemoryTableStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn read_row(root: &Path, partition: &str, row: &str) -> TableRow {
    let path = root
        .join("SaleEvents")
        .join(partition)
        .join(format!("{row}.json"));
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn local_pipeline(root: &Path, batch: &str, extra: &str) -> Pipeline {
    create_test_xml_file(&root.join("incoming").join("batch.xml"), batch);
    let config_path = root.join("pipeline.toml");
    write_local_config(&config_path, root, extra);
    let config = PipelineConfig::from_toml_file(&config_path).unwrap();
    Pipeline::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_sparse_event_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let report = local_pipeline(root, SPARSE_EVENT_XML, "")
        .run()
        .await
        .unwrap();
    assert_eq!(report.published, 1);
    assert!(report.failed.is_empty());

    let row = read_row(root, "Store3", "7");
    assert_eq!(row.partition_key, "Store3");
    assert_eq!(row.row_key, "7");
    assert_eq!(row.transaction_id, "7");
    assert_eq!(row.total_amount, "");
    assert_eq!(row.start_time, " ");
    assert_eq!(row.blob_name, "saleevent-7.xml");
    assert_eq!(row.retry_count, 0);
    assert_eq!(row.status, EventStatus::Pending);

    let fragment = extract(SPARSE_EVENT_XML).unwrap().remove(0).fragment;
    let archived = fs::read_to_string(root.join("incoming").join("saleevent-7.xml")).unwrap();
    assert_eq!(archived, fragment.as_str());
}

#[tokio::test]
async fn test_sample_batch_to_archive_container() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let report = local_pipeline(root, SAMPLE_BATCH, r#"archive_container = "archive""#)
        .run()
        .await
        .unwrap();
    assert_eq!(report.published, 3);

    assert_eq!(read_row(root, "Store42", "A").total_amount, "10.80");
    assert_eq!(read_row(root, "Store42", "B").outside_sales, "yes");
    assert_eq!(read_row(root, "Store43", "C").total_amount, "0.00");

    for id in ["A", "B", "C"] {
        assert!(root.join("archive").join(format!("saleevent-{id}.xml")).exists());
        assert!(!root.join("incoming").join(format!("saleevent-{id}.xml")).exists());
    }
}

#[tokio::test]
async fn test_rerun_fails_on_duplicate_key() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    local_pipeline(root, SAMPLE_BATCH, "").run().await.unwrap();
    let err = local_pipeline(root, SAMPLE_BATCH, "")
        .run()
        .await
        .unwrap_err();

    match err {
        AppError::DuplicateKey { partition, row } => {
            assert_eq!(partition, "Store42");
            assert_eq!(row, "A");
        }
        other => panic!("expected DuplicateKey, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rerun_with_continue_reports_every_duplicate() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    local_pipeline(root, SAMPLE_BATCH, "").run().await.unwrap();
    let report = local_pipeline(root, SAMPLE_BATCH, r#"on_error = "continue""#)
        .run()
        .await
        .unwrap();

    assert_eq!(report.published, 0);
    assert_eq!(report.failed_transaction_ids(), vec!["A", "B", "C"]);
    let message = report.into_result().unwrap_err().to_string();
    assert!(message.contains("A, B, C"));
}

#[tokio::test]
async fn test_missing_source_blob() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_local_config(&root.join("pipeline.toml"), root, "");
    let config = PipelineConfig::from_toml_file(&root.join("pipeline.toml")).unwrap();

    let err = Pipeline::from_config(&config)
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SourceUnavailable(_)));
    assert!(!root.join("SaleEvents").exists());
}

#[tokio::test]
async fn test_blob_failure_does_not_undo_row() {
    let source = Arc::new(MemoryBlobStore::with_blob("batch.xml", SAMPLE_BATCH));
    let table = Arc::new(MemoryTableStore::new());
    let archive = Arc::new(FailingBlobStore {
        failing: vec!["saleevent-B.xml".to_string()],
    });

    let pipeline = Pipeline::new(
        DocumentLoader::new(source, "batch.xml"),
        EventPublisher::new(table.clone(), archive, FailurePolicy::Continue),
    );
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.published, 2);
    assert_eq!(report.failed_transaction_ids(), vec!["B"]);
    assert!(report.failed[0].error.contains("Sink unavailable"));
    // The row written before the failed upload stays
    assert!(table.get("Store42", "B").is_some());
    assert_eq!(table.len(), 3);
}

#[tokio::test]
async fn test_blob_failure_fail_fast_keeps_earlier_writes() {
    let source = Arc::new(MemoryBlobStore::with_blob("batch.xml", SAMPLE_BATCH));
    let table = Arc::new(MemoryTableStore::new());
    let archive = Arc::new(FailingBlobStore {
        failing: vec!["saleevent-B.xml".to_string()],
    });

    let pipeline = Pipeline::new(
        DocumentLoader::new(source, "batch.xml"),
        EventPublisher::new(table.clone(), archive, FailurePolicy::FailFast),
    );
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, AppError::SinkUnavailable(_)));
    assert!(table.get("Store42", "A").is_some());
    assert!(table.get("Store42", "B").is_some());
    assert!(table.get("Store43", "C").is_none());
}
