//! Total field lookups over a parsed element.
//!
//! Every lookup searches the element's descendants (never the element itself),
//! takes the first match in document order, and falls back to an empty string.

use super::tree::Element;

/// Text content of the first descendant named `tag`.
pub fn child_text(element: &Element, tag: &str) -> String {
    element
        .find_descendant(tag)
        .map(Element::text_content)
        .unwrap_or_default()
}

/// Text of the first `inner` found within the first `outer`.
pub fn nested_text(element: &Element, outer: &str, inner: &str) -> String {
    match element.find_descendant(outer) {
        Some(outer) => child_text(outer, inner),
        None => String::new(),
    }
}

/// Value of `attr` on the first descendant named `tag`.
pub fn attribute(element: &Element, tag: &str, attr: &str) -> String {
    element
        .find_descendant(tag)
        .and_then(|found| found.attribute(attr))
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::parse_element;

    #[test]
    fn nested_text_reads_inner_value() {
        let element = parse_element(
            "<SaleEvent><TransactionSummary><TransactionTotalGrandAmount>12.50</TransactionTotalGrandAmount></TransactionSummary></SaleEvent>",
        )
        .unwrap();
        assert_eq!(
            nested_text(&element, "TransactionSummary", "TransactionTotalGrandAmount"),
            "12.50"
        );
    }

    #[test]
    fn nested_text_without_outer_is_empty() {
        let element = parse_element(
            "<SaleEvent><TransactionTotalGrandAmount>12.50</TransactionTotalGrandAmount></SaleEvent>",
        )
        .unwrap();
        assert_eq!(
            nested_text(&element, "TransactionSummary", "TransactionTotalGrandAmount"),
            ""
        );
    }

    #[test]
    fn nested_text_ignores_inner_outside_outer() {
        let element = parse_element(
            "<SaleEvent><Amount>1</Amount><Summary><Other/></Summary></SaleEvent>",
        )
        .unwrap();
        assert_eq!(nested_text(&element, "Summary", "Amount"), "");
    }

    #[test]
    fn attribute_ignores_text_content() {
        let element = parse_element(
            r#"<SaleEvent><OutsideSalesFlag value="true">ignored</OutsideSalesFlag></SaleEvent>"#,
        )
        .unwrap();
        assert_eq!(attribute(&element, "OutsideSalesFlag", "value"), "true");
        assert_eq!(child_text(&element, "OutsideSalesFlag"), "ignored");
    }

    #[test]
    fn missing_attribute_is_empty() {
        let element =
            parse_element("<SaleEvent><OutsideSalesFlag>yes</OutsideSalesFlag></SaleEvent>")
                .unwrap();
        assert_eq!(attribute(&element, "OutsideSalesFlag", "value"), "");
        assert_eq!(attribute(&element, "Missing", "value"), "");
    }

    #[test]
    fn duplicate_tags_take_first_in_document_order() {
        let element = parse_element(
            "<SaleEvent><Group><CashierID>first</CashierID></Group><CashierID>second</CashierID></SaleEvent>",
        )
        .unwrap();
        assert_eq!(child_text(&element, "CashierID"), "first");
    }

    #[test]
    fn empty_element_text_is_empty() {
        let element = parse_element("<SaleEvent><CashierID/></SaleEvent>").unwrap();
        assert_eq!(child_text(&element, "CashierID"), "");
        assert_eq!(child_text(&element, "RegisterID"), "");
    }

    #[test]
    fn child_text_resolves_entities_and_cdata() {
        let element = parse_element(
            "<SaleEvent><Note>A &amp; B<![CDATA[ <raw> ]]>&#33;</Note></SaleEvent>",
        )
        .unwrap();
        assert_eq!(child_text(&element, "Note"), "A & B <raw> !");
    }
}
