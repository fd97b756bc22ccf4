use super::entities::EntityMap;
use crate::errors::{AppError, AppResult};
use quick_xml::escape::{resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;

/// A node inside an element: either a child element or a run of character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// In-memory XML element with resolved attribute values and text.
///
/// Adjacent character data (text, CDATA, entity references) is merged into a
/// single `Node::Text`, so two documents that differ only in how their text is
/// split compare equal. Comments and processing instructions are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written in the document, prefix included.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Value of the named attribute on this element.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated character data of this element and all its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    pub fn child_elements(&self) -> impl DoubleEndedIterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Descendant elements in document order, not including `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.child_elements().rev().collect(),
        }
    }

    /// First descendant element with the given qualified name.
    pub fn find_descendant(&self, name: &str) -> Option<&Element> {
        self.descendants().find(|element| element.name == name)
    }
}

/// Pre-order iterator over descendant elements.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.child_elements().rev());
        Some(element)
    }
}

/// Builds an [`Element`] tree from a stream of reader events.
///
/// Events outside the first element are ignored, apart from a `<!DOCTYPE>`
/// whose entity declarations are picked up. The caller decides whether they
/// are legal.
///
/// Line endings in character data are normalized to `\n`; literal tabs and
/// line breaks in attribute values become spaces.
pub(crate) struct TreeBuilder {
    open: Vec<Element>,
    root: Option<Element>,
    entities: EntityMap,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::with_entities(EntityMap::default())
    }

    /// Builder for a subtree of a document that declared `entities`.
    pub fn with_entities(entities: EntityMap) -> Self {
        Self {
            open: Vec::new(),
            root: None,
            entities,
        }
    }

    pub fn handle_event(&mut self, event: &Event) -> AppResult<()> {
        match event {
            Event::Start(e) => {
                let element = element_from_start(e, &self.entities)?;
                self.open.push(element);
            }
            Event::Empty(e) => {
                let element = element_from_start(e, &self.entities)?;
                self.attach(element);
            }
            Event::End(_) => {
                let element = self.open.pop().ok_or_else(|| {
                    AppError::MalformedDocument("closing tag without an open element".to_string())
                })?;
                self.attach(element);
            }
            Event::Text(e) => {
                let text = e.decode().map_err(|e| {
                    AppError::MalformedDocument(format!("Failed to decode XML text: {e}"))
                })?;
                self.push_text(&normalize_line_endings(&text));
            }
            Event::CData(e) => {
                let text = e.decode().map_err(|e| {
                    AppError::MalformedDocument(format!("Failed to decode CDATA: {e}"))
                })?;
                self.push_text(&normalize_line_endings(&text));
            }
            Event::GeneralRef(e) => {
                let text = self.entities.resolve(e)?;
                self.push_text(&text);
            }
            Event::DocType(e) if self.open.is_empty() && self.root.is_none() => {
                self.entities = EntityMap::from_doctype(e)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the completed tree, or `None` while an element is still open.
    pub fn finish(self) -> Option<Element> {
        if self.open.is_empty() {
            self.root
        } else {
            None
        }
    }

    fn attach(&mut self, element: Element) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => {
                if self.root.is_none() {
                    self.root = Some(element);
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(parent) = self.open.last_mut() {
            match parent.children.last_mut() {
                Some(Node::Text(existing)) => existing.push_str(text),
                _ => parent.children.push(Node::Text(text.to_owned())),
            }
        }
    }
}

fn element_from_start(start: &BytesStart, entities: &EntityMap) -> AppResult<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| {
            AppError::MalformedDocument(format!("Invalid attribute on <{name}>: {e}"))
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let normalized = normalize_attribute_value(&raw);
        let value = unescape_with(&normalized, |entity| {
            resolve_predefined_entity(entity).or_else(|| entities.get(entity))
        })
        .map_err(|e| {
            AppError::MalformedDocument(format!("Invalid value for attribute '{key}': {e}"))
        })?
        .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

/// XML end-of-line handling: `\r\n` and a lone `\r` both become `\n`.
fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Attribute-value normalization on the raw value, before references are
/// resolved, so `&#9;` still yields a tab.
fn normalize_attribute_value(raw: &str) -> Cow<'_, str> {
    let text = normalize_line_endings(raw);
    if text.contains(['\t', '\n']) {
        Cow::Owned(text.replace(['\t', '\n'], " "))
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, text: &str) -> Element {
        Element {
            name: name.to_string(),
            attributes: Vec::new(),
            children: vec![Node::Text(text.to_string())],
        }
    }

    #[test]
    fn descendants_are_in_document_order() {
        let mut inner = Element::new("b");
        inner.children.push(Node::Element(leaf("c", "1")));
        let mut root = Element::new("a");
        root.children.push(Node::Element(inner));
        root.children.push(Node::Element(leaf("d", "2")));

        let names: Vec<&str> = root.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn descendants_exclude_self() {
        let mut root = Element::new("a");
        root.children.push(Node::Element(leaf("a", "inner")));

        let found = root.find_descendant("a").unwrap();
        assert_eq!(found.text_content(), "inner");
    }

    #[test]
    fn text_content_concatenates_nested_text() {
        let mut root = Element::new("a");
        root.children.push(Node::Text("x".to_string()));
        root.children.push(Node::Element(leaf("b", "y")));
        root.children.push(Node::Text("z".to_string()));
        assert_eq!(root.text_content(), "xyz");
    }

    #[test]
    fn attribute_lookup() {
        let mut element = Element::new("Flag");
        element
            .attributes
            .push(("value".to_string(), "true".to_string()));
        assert_eq!(element.attribute("value"), Some("true"));
        assert_eq!(element.attribute("other"), None);
    }

    #[test]
    fn builder_merges_adjacent_text() {
        let mut builder = TreeBuilder::new();
        builder
            .handle_event(&Event::Start(BytesStart::new("a")))
            .unwrap();
        builder
            .handle_event(&Event::Text(quick_xml::events::BytesText::from_escaped("x")))
            .unwrap();
        builder
            .handle_event(&Event::CData(quick_xml::events::BytesCData::new("y")))
            .unwrap();
        builder
            .handle_event(&Event::End(quick_xml::events::BytesEnd::new("a")))
            .unwrap();

        let root = builder.finish().unwrap();
        assert_eq!(root.children, vec![Node::Text("xy".to_string())]);
    }

    #[test]
    fn text_line_endings_are_normalized() {
        let root = crate::extractor::parse_element("<a>x\r\ny\rz<![CDATA[\r\n]]></a>").unwrap();
        assert_eq!(root.text_content(), "x\ny\nz\n");
    }

    #[test]
    fn attribute_whitespace_becomes_spaces() {
        let root =
            crate::extractor::parse_element("<a v=\"1\t2\r\n3\n4\" w=\"1&#9;2\"/>").unwrap();
        assert_eq!(root.attribute("v"), Some("1 2 3 4"));
        assert_eq!(root.attribute("w"), Some("1\t2"));
    }

    #[test]
    fn doctype_entities_are_resolved() {
        let root = crate::extractor::parse_element(
            "<!DOCTYPE a [<!ENTITY s \"42\">]><a v=\"&amp;&s;\">&s;!</a>",
        )
        .unwrap();
        assert_eq!(root.text_content(), "42!");
        assert_eq!(root.attribute("v"), Some("&42"));
    }

    #[test]
    fn builder_without_close_is_incomplete() {
        let mut builder = TreeBuilder::new();
        builder
            .handle_event(&Event::Start(BytesStart::new("a")))
            .unwrap();
        assert!(builder.finish().is_none());
    }
}
