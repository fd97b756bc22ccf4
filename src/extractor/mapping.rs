use super::lookup::{attribute, child_text, nested_text};
use super::tree::Element;
use crate::constants::*;
use crate::models::{archive_blob_name, EventStatus, SaleEvent};

/// Maps a `<SaleEvent>` element onto its summary record.
///
/// Never fails: fields the element does not carry come out empty.
pub fn map_sale_event(element: &Element) -> SaleEvent {
    let transaction_id = child_text(element, TRANSACTION_ID_TAG);
    let archive_blob_name = archive_blob_name(&transaction_id);

    SaleEvent {
        cashier_id: child_text(element, CASHIER_ID_TAG),
        register_id: child_text(element, REGISTER_ID_TAG),
        start_time: join_date_time(element, EVENT_START_DATE_TAG, EVENT_START_TIME_TAG),
        end_time: join_date_time(element, EVENT_END_DATE_TAG, EVENT_END_TIME_TAG),
        total_amount: nested_text(element, TRANSACTION_SUMMARY_TAG, GRAND_TOTAL_TAG),
        outside_sales_flag: attribute(element, OUTSIDE_SALES_FLAG_TAG, OUTSIDE_SALES_FLAG_ATTR),
        loyalty_transaction_id: child_text(element, LOYALTY_TRANSACTION_ID_TAG),
        store_id: child_text(element, STORE_ID_TAG),
        retry_count: 0,
        status: EventStatus::Pending,
        archive_blob_name,
        transaction_id,
    }
}

// Date and time are joined with a single space even when either is empty.
fn join_date_time(element: &Element, date_tag: &str, time_tag: &str) -> String {
    format!(
        "{} {}",
        child_text(element, date_tag),
        child_text(element, time_tag)
    )
}
