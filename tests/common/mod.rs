//! Common test utilities for integration tests

use async_trait::async_trait;
use saleevent_ingest::errors::{AppError, AppResult};
use saleevent_ingest::storage::BlobStore;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Helper function to create a test XML file in a directory
#[allow(dead_code)]
pub fn create_test_xml_file(path: &Path, content: &str) {
    let parent = path.parent().unwrap();
    fs::create_dir_all(parent).unwrap();
    fs::File::create(path)
        .unwrap()
        .write_all(content.as_bytes())
        .unwrap();
}

/// Writes a TOML config pointing both services at a local directory.
#[allow(dead_code)]
pub fn write_local_config(path: &Path, root: &Path, extra: &str) {
    let content = format!(
        r#"
blob_connection = "file://{root}"
table_connection = "LocalRoot={root}"
container = "incoming"
blob_name = "batch.xml"
table_name = "SaleEvents"
{extra}
"#,
        root = root.display()
    );
    fs::write(path, content).unwrap();
}

/// Blob store whose uploads fail for the listed names.
#[allow(dead_code)]
pub struct FailingBlobStore {
    pub failing: Vec<String>,
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn read_text(&self, name: &str) -> AppResult<String> {
        Err(AppError::SourceUnavailable(format!("{name} is not readable")))
    }

    async fn upload(&self, name: &str, _body: &str, _overwrite: bool) -> AppResult<()> {
        if self.failing.iter().any(|n| n == name) {
            Err(AppError::SinkUnavailable(format!("upload of {name} refused")))
        } else {
            Ok(())
        }
    }
}

/// Batch with three fully populated sale events, A, B and C.
#[allow(dead_code)]
pub const SAMPLE_BATCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<NAXML-POSJournal version="3.4">
  <TransmissionHeader>
    <StoreLocationID>42</StoreLocationID>
  </TransmissionHeader>
  <JournalReport>
    <SaleEvent>
      <EventSequenceID>1</EventSequenceID>
      <TransactionID>A</TransactionID>
      <CashierID>C1</CashierID>
      <RegisterID>R1</RegisterID>
      <StoreHierarchyID>42</StoreHierarchyID>
      <EventStartDate>2024-03-01</EventStartDate>
      <EventStartTime>09:15:00</EventStartTime>
      <EventEndDate>2024-03-01</EventEndDate>
      <EventEndTime>09:16:10</EventEndTime>
      <OutsideSalesFlag value="no"/>
      <TransactionSummary>
        <TransactionTotalGrossAmount>10.00</TransactionTotalGrossAmount>
        <TransactionTotalGrandAmount direction="Collected">10.80</TransactionTotalGrandAmount>
      </TransactionSummary>
    </SaleEvent>
    <SaleEvent>
      <TransactionID>B</TransactionID>
      <CashierID>C2</CashierID>
      <StoreHierarchyID>42</StoreHierarchyID>
      <OutsideSalesFlag value="yes">pump 4</OutsideSalesFlag>
      <LoyaltyTransactionID>L-900</LoyaltyTransactionID>
      <TransactionSummary>
        <TransactionTotalGrandAmount>45.10</TransactionTotalGrandAmount>
      </TransactionSummary>
    </SaleEvent>
    <SaleEvent>
      <TransactionID>C</TransactionID>
      <StoreHierarchyID>43</StoreHierarchyID>
      <!-- voided -->
      <TransactionSummary>
        <TransactionTotalGrandAmount>0.00</TransactionTotalGrandAmount>
      </TransactionSummary>
    </SaleEvent>
  </JournalReport>
</NAXML-POSJournal>"#;

/// One sparse sale event carrying only its transaction and store ids.
#[allow(dead_code)]
pub const SPARSE_EVENT_XML: &str =
    "<Batch><SaleEvent><TransactionID>7</TransactionID><StoreHierarchyID>3</StoreHierarchyID></SaleEvent></Batch>";

/// Well-formed document without sale events
#[allow(dead_code)]
pub const EMPTY_BATCH: &str = r#"<?xml version="1.0"?>
<Batch>
</Batch>"#;
