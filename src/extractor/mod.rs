mod document;
mod entities;
mod lookup;
mod mapping;
mod scope;
mod tree;

// Re-export public API
pub use document::{extract, parse_element};
pub use entities::EntityMap;
pub use lookup::{attribute, child_text, nested_text};
pub use mapping::map_sale_event;
pub use tree::{Descendants, Element, Node};
