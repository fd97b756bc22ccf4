use super::entities::EntityMap;
use super::tree::{Element, TreeBuilder};
use crate::errors::{AppError, AppResult};
use crate::models::RawFragment;
use quick_xml::events::{BytesText, Event};
use quick_xml::writer::Writer;
use std::io::Cursor;

/// Result from finishing a `<SaleEvent>` scope.
pub struct ScopeResult {
    /// Position of the element among all sale events, in start-tag order.
    pub slot: usize,
    pub element: Element,
    pub fragment: RawFragment,
}

/// Captures one `<SaleEvent>` subtree.
///
/// Every event inside the subtree is written back out unchanged to build the
/// raw fragment, and fed to a tree builder for field lookups. References to
/// entities declared in the document's DOCTYPE are written as their escaped
/// replacement text, so the fragment parses on its own.
pub struct SaleEventScope {
    slot: usize,
    depth: u32,
    writer: Writer<Cursor<Vec<u8>>>,
    tree: TreeBuilder,
    entities: EntityMap,
}

impl SaleEventScope {
    /// Creates a new scope initialized with the `<SaleEvent>` start (or empty) event.
    pub fn start(slot: usize, event: Event, entities: &EntityMap) -> AppResult<Self> {
        let depth = match &event {
            Event::Start(_) => 1,
            _ => 0,
        };
        let mut tree = TreeBuilder::with_entities(entities.clone());
        tree.handle_event(&event)?;

        let cursor = Cursor::new(Vec::with_capacity(4 * 1024));
        let mut writer = Writer::new(cursor);
        writer
            .write_event(event)
            .map_err(|e| AppError::MalformedDocument(format!("Failed to buffer SaleEvent: {e}")))?;

        Ok(Self {
            slot,
            depth,
            writer,
            tree,
            entities: entities.clone(),
        })
    }

    /// Returns true once the closing tag of the captured element has been seen.
    pub fn is_complete(&self) -> bool {
        self.depth == 0
    }

    /// Handles an event within the `<SaleEvent>` subtree.
    pub fn handle_event(&mut self, event: Event) -> AppResult<()> {
        match &event {
            Event::Start(_) => self.depth = self.depth.saturating_add(1),
            Event::End(_) => {
                self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                    AppError::MalformedDocument("SaleEvent depth underflow".to_string())
                })?;
            }
            _ => {}
        }

        self.tree.handle_event(&event)?;
        let replacement = match &event {
            Event::GeneralRef(reference) => self.entities.declared(reference)?.map(str::to_owned),
            _ => None,
        };
        let written = match replacement {
            Some(text) => self.writer.write_event(Event::Text(BytesText::new(&text))),
            None => self.writer.write_event(event),
        };
        written.map_err(|e| AppError::MalformedDocument(format!("Failed to capture XML: {e}")))
    }

    /// Completes the scope and returns the parsed element and its raw XML.
    pub fn finish(self) -> AppResult<ScopeResult> {
        let element = self.tree.finish().ok_or_else(|| {
            AppError::MalformedDocument("SaleEvent element was not closed".to_string())
        })?;

        let buffer = self.writer.into_inner().into_inner();
        let raw_xml = String::from_utf8(buffer)
            .map_err(|e| AppError::MalformedDocument(format!("Invalid UTF-8 in XML: {e}")))?;

        Ok(ScopeResult {
            slot: self.slot,
            element,
            fragment: RawFragment::new(raw_xml),
        })
    }
}
