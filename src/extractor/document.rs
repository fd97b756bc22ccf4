use super::entities::EntityMap;
use super::mapping::map_sale_event;
use super::scope::SaleEventScope;
use super::tree::{Element, TreeBuilder};
use crate::constants::SALE_EVENT_TAG;
use crate::errors::{AppError, AppResult};
use crate::models::ExtractedEvent;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, info};

/// Reads `xml` strictly and hands every event to `visit`, in document order.
///
/// Rejects documents with no root element, more than one root, character data
/// outside the root, or elements left open at end of input. Text is not
/// trimmed so captured fragments keep their original whitespace. The `Eof`
/// event is not forwarded.
///
/// Entity references are resolved by the consumers of the events: character
/// references, the predefined entities, and general entities declared with a
/// literal value in the internal DOCTYPE subset. External and parameter
/// entities are not loaded, and a reference to one is `MalformedDocument`.
pub(crate) fn walk_document<'a, F>(xml: &'a str, mut visit: F) -> AppResult<()>
where
    F: FnMut(Event<'a>) -> AppResult<()>,
{
    let mut reader = Reader::from_str(xml);
    let mut depth: usize = 0;
    let mut roots: usize = 0;

    loop {
        let event = reader.read_event().map_err(|e| {
            AppError::MalformedDocument(format!(
                "{e} (at byte {})",
                reader.buffer_position()
            ))
        })?;

        match &event {
            Event::Start(_) | Event::Empty(_) => {
                if depth == 0 {
                    roots += 1;
                    if roots > 1 {
                        return Err(AppError::MalformedDocument(format!(
                            "More than one root element (at byte {})",
                            reader.buffer_position()
                        )));
                    }
                }
                if matches!(&event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    AppError::MalformedDocument("Closing tag without an open element".to_string())
                })?;
            }
            Event::Text(text) if depth == 0 => {
                if !text.iter().all(|b| b.is_ascii_whitespace()) {
                    return Err(AppError::MalformedDocument(format!(
                        "Text outside the root element (at byte {})",
                        reader.buffer_position()
                    )));
                }
            }
            Event::CData(_) | Event::GeneralRef(_) if depth == 0 => {
                return Err(AppError::MalformedDocument(format!(
                    "Character data outside the root element (at byte {})",
                    reader.buffer_position()
                )));
            }
            Event::Eof => {
                if depth > 0 {
                    return Err(AppError::MalformedDocument(format!(
                        "Unexpected end of document, {depth} element(s) left open"
                    )));
                }
                if roots == 0 {
                    return Err(AppError::MalformedDocument(
                        "Document has no root element".to_string(),
                    ));
                }
                break;
            }
            _ => {}
        }

        visit(event)?;
    }

    Ok(())
}

/// Extracts every `SaleEvent` element of `xml`, in document order.
///
/// Each result pairs the mapped summary record with the element's XML exactly
/// as it appeared in the input. Fails only when the document itself is not
/// well-formed; sparse or empty `SaleEvent` elements still produce a record.
///
/// # Example
///
/// ```
/// use saleevent_ingest::extractor::extract;
///
/// # fn main() -> Result<(), saleevent_ingest::errors::AppError> {
/// let events = extract("<Batch><SaleEvent><TransactionID>7</TransactionID></SaleEvent></Batch>")?;
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].event.transaction_id, "7");
/// assert_eq!(events[0].fragment.as_str(), "<SaleEvent><TransactionID>7</TransactionID></SaleEvent>");
/// # Ok(())
/// # }
/// ```
pub fn extract(xml: &str) -> AppResult<Vec<ExtractedEvent>> {
    let mut open: Vec<SaleEventScope> = Vec::new();
    // Filled when a scope closes; nested events close before their parent
    let mut slots: Vec<Option<ExtractedEvent>> = Vec::new();
    let mut entities = EntityMap::default();

    walk_document(xml, |event| {
        if let Event::DocType(doctype) = &event {
            entities = EntityMap::from_doctype(doctype)?;
        }
        for scope in open.iter_mut() {
            scope.handle_event(event.clone())?;
        }

        let starts_sale_event = matches!(
            &event,
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == SALE_EVENT_TAG.as_bytes()
        );
        if starts_sale_event {
            open.push(SaleEventScope::start(slots.len(), event, &entities)?);
            slots.push(None);
        }

        if open.last().is_some_and(SaleEventScope::is_complete) {
            if let Some(scope) = open.pop() {
                let result = scope.finish()?;
                let event = map_sale_event(&result.element);
                debug!(
                    transaction_id = %event.transaction_id,
                    store_id = %event.store_id,
                    fragment_bytes = result.fragment.as_str().len(),
                    "Extracted sale event"
                );
                slots[result.slot] = Some(ExtractedEvent {
                    event,
                    fragment: result.fragment,
                });
            }
        }
        Ok(())
    })?;

    let events = slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| AppError::MalformedDocument("SaleEvent element was not closed".into()))?;

    info!(events = events.len(), "Extracted sale events");
    Ok(events)
}

/// Parses a standalone XML document or fragment into its root element.
pub fn parse_element(xml: &str) -> AppResult<Element> {
    let mut tree = TreeBuilder::new();
    walk_document(xml, |event| tree.handle_event(&event))?;
    tree.finish()
        .ok_or_else(|| AppError::MalformedDocument("Document has no root element".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_rejects_unclosed_element() {
        let result = walk_document("<a><b></b>", |_| Ok(()));
        assert!(matches!(result, Err(AppError::MalformedDocument(_))));
    }

    #[test]
    fn walk_rejects_mismatched_end_tag() {
        let result = walk_document("<a><b></a></b>", |_| Ok(()));
        assert!(matches!(result, Err(AppError::MalformedDocument(_))));
    }

    #[test]
    fn walk_rejects_two_roots() {
        let result = walk_document("<a/><b/>", |_| Ok(()));
        assert!(matches!(result, Err(AppError::MalformedDocument(_))));
    }

    #[test]
    fn walk_rejects_empty_input() {
        let result = walk_document("   ", |_| Ok(()));
        assert!(matches!(result, Err(AppError::MalformedDocument(_))));
    }

    #[test]
    fn walk_rejects_text_after_root() {
        let result = walk_document("<a/>trailing", |_| Ok(()));
        assert!(matches!(result, Err(AppError::MalformedDocument(_))));
    }

    #[test]
    fn walk_accepts_declaration_and_comments() {
        let mut count = 0;
        walk_document(
            "<?xml version=\"1.0\"?>\n<!-- batch -->\n<a>x</a>\n",
            |_| {
                count += 1;
                Ok(())
            },
        )
        .unwrap();
        assert!(count >= 3);
    }

    #[test]
    fn extract_keeps_nested_sale_events_in_start_order() {
        let xml = "<Batch><SaleEvent><TransactionID>outer</TransactionID><SaleEvent><TransactionID>inner</TransactionID></SaleEvent></SaleEvent></Batch>";
        let events = extract(xml).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event.transaction_id, "outer");
        assert_eq!(events[1].event.transaction_id, "inner");
        assert!(events[0]
            .fragment
            .as_str()
            .contains(events[1].fragment.as_str()));
    }

    #[test]
    fn extract_rejects_undeclared_entity_inside_sale_event() {
        let xml = "<Batch><SaleEvent><CashierID>&nbsp;</CashierID></SaleEvent></Batch>";
        assert!(matches!(
            extract(xml),
            Err(AppError::MalformedDocument(_))
        ));
    }

    #[test]
    fn extract_resolves_doctype_entities() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE Batch [
  <!ENTITY store "42">
]>
<Batch><SaleEvent><TransactionID>T1</TransactionID><StoreHierarchyID>&store;</StoreHierarchyID></SaleEvent></Batch>"#;
        let events = extract(xml).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.store_id, "42");
        let fragment = events[0].fragment.as_str();
        assert!(fragment.contains("<StoreHierarchyID>42</StoreHierarchyID>"));
        assert_eq!(
            parse_element(fragment).unwrap(),
            parse_element(xml).unwrap().child_elements().next().cloned().unwrap()
        );
    }

    #[test]
    fn extract_rejects_external_entity_reference() {
        let xml = r#"<!DOCTYPE Batch [<!ENTITY ext SYSTEM "ext.xml">]>
<Batch><SaleEvent><CashierID>&ext;</CashierID></SaleEvent></Batch>"#;
        assert!(matches!(
            extract(xml),
            Err(AppError::MalformedDocument(_))
        ));
    }

    #[test]
    fn extract_normalizes_crlf_in_fields() {
        let xml = "<Batch>\r\n<SaleEvent>\r\n<CashierID>C\r\n1</CashierID>\r\n\
                   <OutsideSalesFlag value=\"y\r\nes\"/></SaleEvent>\r\n</Batch>";
        let events = extract(xml).unwrap();
        let event = &events[0].event;
        assert_eq!(event.cashier_id, "C\n1");
        assert_eq!(event.outside_sales_flag, "y es");
    }

    #[test]
    fn extract_does_not_match_prefixed_names() {
        let xml = r#"<Batch xmlns:n="urn:x"><n:SaleEvent><TransactionID>1</TransactionID></n:SaleEvent></Batch>"#;
        assert!(extract(xml).unwrap().is_empty());
    }

    #[test]
    fn parse_element_returns_root() {
        let root = parse_element("<?xml version=\"1.0\"?><a k=\"v\"><b>t</b></a>").unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.attribute("k"), Some("v"));
        assert_eq!(root.text_content(), "t");
    }
}
