// Environment variables read by `PipelineConfig::from_env`
pub const ENV_BLOB_CONNECTION: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const ENV_TABLE_CONNECTION: &str = "AZURE_TABLE_CONNECTION_STRING";
pub const ENV_CONTAINER: &str = "BLOB_CONTAINER_NAME";
pub const ENV_BLOB_NAME: &str = "BLOB_NAME";
pub const ENV_TABLE_NAME: &str = "TABLE_NAME";
pub const ENV_ARCHIVE_CONTAINER: &str = "ARCHIVE_CONTAINER_NAME";
pub const ENV_ON_ERROR: &str = "ON_ERROR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Sale event element and the tags read from inside it
pub const SALE_EVENT_TAG: &str = "SaleEvent";
pub const TRANSACTION_ID_TAG: &str = "TransactionID";
pub const CASHIER_ID_TAG: &str = "CashierID";
pub const REGISTER_ID_TAG: &str = "RegisterID";
pub const EVENT_START_DATE_TAG: &str = "EventStartDate";
pub const EVENT_START_TIME_TAG: &str = "EventStartTime";
pub const EVENT_END_DATE_TAG: &str = "EventEndDate";
pub const EVENT_END_TIME_TAG: &str = "EventEndTime";
pub const TRANSACTION_SUMMARY_TAG: &str = "TransactionSummary";
pub const GRAND_TOTAL_TAG: &str = "TransactionTotalGrandAmount";
pub const OUTSIDE_SALES_FLAG_TAG: &str = "OutsideSalesFlag";
pub const OUTSIDE_SALES_FLAG_ATTR: &str = "value";
pub const LOYALTY_TRANSACTION_ID_TAG: &str = "LoyaltyTransactionID";
pub const STORE_ID_TAG: &str = "StoreHierarchyID";

// Key and blob naming
pub const PARTITION_PREFIX: &str = "Store";
pub const ARCHIVE_BLOB_PREFIX: &str = "saleevent-";
pub const ARCHIVE_BLOB_SUFFIX: &str = ".xml";

// Storage REST protocol
pub const STORAGE_API_VERSION: &str = "2020-12-06";
