use crate::constants::*;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reconciliation state seeded on every summary row.
///
/// Only `Pending` is ever written by this crate. `Processed` and `Failed` are
/// the states a downstream consumer moves a row into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processed,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattened summary of one `SaleEvent` element.
///
/// Every text field is the raw string found in the document, or empty when the
/// document does not carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleEvent {
    pub transaction_id: String,
    pub cashier_id: String,
    pub register_id: String,
    pub start_time: String,
    pub end_time: String,
    pub total_amount: String,
    pub outside_sales_flag: String,
    pub loyalty_transaction_id: String,
    pub store_id: String,
    pub retry_count: i32,
    pub status: EventStatus,
    pub archive_blob_name: String,
}

impl SaleEvent {
    /// Storage key of the summary row.
    pub fn key(&self) -> TableKey {
        TableKey::new(&self.store_id, &self.transaction_id)
    }

    /// Builds the table row written for this event.
    pub fn to_row(&self) -> TableRow {
        let key = self.key();
        TableRow {
            partition_key: key.partition,
            row_key: key.row,
            transaction_id: self.transaction_id.clone(),
            cashier_id: self.cashier_id.clone(),
            register_id: self.register_id.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            total_amount: self.total_amount.clone(),
            outside_sales: self.outside_sales_flag.clone(),
            loyalty_txn_id: self.loyalty_transaction_id.clone(),
            blob_name: self.archive_blob_name.clone(),
            retry_count: self.retry_count,
            status: self.status,
        }
    }
}

/// Returns the archive blob name for a transaction id.
pub fn archive_blob_name(transaction_id: &str) -> String {
    format!("{ARCHIVE_BLOB_PREFIX}{transaction_id}{ARCHIVE_BLOB_SUFFIX}")
}

/// Composite key addressing a summary row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey {
    pub partition: String,
    pub row: String,
}

impl TableKey {
    pub fn new(store_id: &str, transaction_id: &str) -> Self {
        Self {
            partition: format!("{PARTITION_PREFIX}{store_id}"),
            row: transaction_id.to_string(),
        }
    }
}

/// Table entity as written to the table store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(rename = "TransactionID")]
    pub transaction_id: String,
    #[serde(rename = "CashierID")]
    pub cashier_id: String,
    #[serde(rename = "RegisterID")]
    pub register_id: String,
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "EndTime")]
    pub end_time: String,
    #[serde(rename = "TotalAmount")]
    pub total_amount: String,
    #[serde(rename = "OutsideSales")]
    pub outside_sales: String,
    #[serde(rename = "LoyaltyTxnID")]
    pub loyalty_txn_id: String,
    #[serde(rename = "blobName")]
    pub blob_name: String,
    #[serde(rename = "retryCount")]
    pub retry_count: i32,
    pub status: EventStatus,
}

impl TableRow {
    pub fn key(&self) -> TableKey {
        TableKey {
            partition: self.partition_key.clone(),
            row: self.row_key.clone(),
        }
    }
}

/// Verbatim XML of one `SaleEvent` subtree, without an XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment(String);

impl RawFragment {
    pub fn new(xml: String) -> Self {
        Self(xml)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// A summary record paired with the fragment it was extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEvent {
    pub event: SaleEvent,
    pub fragment: RawFragment,
}

/// How the publisher reacts to a failed write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failed write.
    #[default]
    FailFast,
    /// Attempt every event and report the failures at the end.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "fail-fast" => Ok(Self::FailFast),
            "continue" => Ok(Self::Continue),
            other => Err(AppError::InvalidConfig(format!(
                "unknown failure policy '{other}', expected 'fail-fast' or 'continue'"
            ))),
        }
    }
}
