use crate::errors::{AppError, AppResult};
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesText};
use std::borrow::Cow;
use std::collections::HashMap;

/// General entities declared in the internal subset of a `<!DOCTYPE>`.
///
/// Only internal entities with a literal value are kept. External entities
/// (`SYSTEM`/`PUBLIC`) and parameter entities (`%name`) are skipped, so a
/// reference to one is reported as undeclared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityMap {
    entities: HashMap<String, String>,
}

impl EntityMap {
    pub fn from_doctype(doctype: &BytesText) -> AppResult<Self> {
        let text = doctype.decode().map_err(|e| {
            AppError::MalformedDocument(format!("Failed to decode DOCTYPE: {e}"))
        })?;
        Self::parse(&text)
    }

    /// Parses the declarations of a DOCTYPE body such as
    /// `Batch [<!ENTITY store "42">]`.
    pub fn parse(doctype: &str) -> AppResult<Self> {
        let mut map = Self::default();
        let Some(open) = doctype.find('[') else {
            return Ok(map);
        };
        let mut rest = &doctype[open + 1..];

        while let Some(pos) = rest.find("<!") {
            rest = &rest[pos..];
            if rest.starts_with("<!--") {
                let end = rest.find("-->").ok_or_else(|| {
                    AppError::MalformedDocument("Unterminated comment in DOCTYPE".to_string())
                })?;
                rest = &rest[end + 3..];
            } else if let Some(declaration) = rest.strip_prefix("<!ENTITY") {
                let (entity, after) = parse_entity(declaration)?;
                if let Some((name, value)) = entity {
                    // The first declaration of a name is binding
                    map.entities.entry(name).or_insert(value);
                }
                rest = after;
            } else {
                rest = skip_declaration(&rest[2..])?;
            }
        }
        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Resolves a character reference, a predefined entity or a declared one.
    pub fn resolve(&self, reference: &BytesRef) -> AppResult<String> {
        if let Some(ch) = reference.resolve_char_ref()? {
            return Ok(ch.to_string());
        }
        let name = decode_name(reference)?;
        if let Some(text) = resolve_predefined_entity(&name) {
            return Ok(text.to_string());
        }
        self.get(&name)
            .map(str::to_string)
            .ok_or_else(|| AppError::MalformedDocument(format!("Undeclared entity '&{name};'")))
    }

    /// Replacement text when `reference` names a DOCTYPE-declared entity;
    /// `None` for character references and the predefined entities.
    pub fn declared(&self, reference: &BytesRef) -> AppResult<Option<&str>> {
        if reference.resolve_char_ref()?.is_some() {
            return Ok(None);
        }
        let name = decode_name(reference)?;
        if resolve_predefined_entity(&name).is_some() {
            return Ok(None);
        }
        self.get(&name)
            .map(Some)
            .ok_or_else(|| AppError::MalformedDocument(format!("Undeclared entity '&{name};'")))
    }
}

fn decode_name<'a>(reference: &'a BytesRef) -> AppResult<Cow<'a, str>> {
    reference
        .decode()
        .map_err(|e| AppError::MalformedDocument(format!("Failed to decode reference: {e}")))
}

/// Parses what follows `<!ENTITY` up to and including the closing `>`.
fn parse_entity(declaration: &str) -> AppResult<(Option<(String, String)>, &str)> {
    let body = declaration.trim_start();
    if body.starts_with('%') {
        return Ok((None, skip_declaration(body)?));
    }

    let name_end = body
        .find(|c: char| c.is_whitespace())
        .ok_or_else(|| AppError::MalformedDocument("Incomplete ENTITY declaration".to_string()))?;
    let name = &body[..name_end];
    let definition = body[name_end..].trim_start();

    let Some(quote) = definition.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        // External entity
        return Ok((None, skip_declaration(definition)?));
    };
    let literal_end = definition[1..].find(quote).ok_or_else(|| {
        AppError::MalformedDocument(format!("Unterminated value for entity '{name}'"))
    })?;
    let literal = &definition[1..1 + literal_end];
    let after = skip_declaration(&definition[literal_end + 2..])?;

    if literal.contains('<') {
        return Err(AppError::MalformedDocument(format!(
            "Entity '{name}' contains markup, which is not supported"
        )));
    }
    let value = unescape(literal).map_err(|e| {
        AppError::MalformedDocument(format!("Unsupported reference in entity '{name}': {e}"))
    })?;
    Ok((Some((name.to_string(), value.into_owned())), after))
}

/// Returns the input following the next `>` that is not inside quotes.
fn skip_declaration(input: &str) -> AppResult<&str> {
    let mut quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Ok(&input[i + 1..]),
            (None, _) => {}
        }
    }
    Err(AppError::MalformedDocument(
        "Unterminated declaration in DOCTYPE".to_string(),
    ))
}
