//! XML decoding utilities.
//!
//! Bulk REST payloads (nodes, programs, variables) have a stable shape and
//! are decoded through serde with `quick-xml`. Event frames carry free-form
//! `eventInfo` content, so they are walked as an `xmltree` element instead.
//! Both paths report failures as [`ParseError`] and never panic.

use crate::error::{ParseError, ParseResult};
use serde::de::DeserializeOwned;
use xmltree::Element;

/// Parse an XML string into a deserializable type.
pub fn parse<T: DeserializeOwned>(xml: &str) -> ParseResult<T> {
    quick_xml::de::from_str(xml).map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
}

/// Parse raw bytes into an element tree.
pub fn parse_element(bytes: &[u8]) -> ParseResult<Element> {
    Element::parse(bytes).map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
}

/// Trimmed text of a direct child, `None` when the child is absent or blank.
pub fn child_text(element: &Element, name: &str) -> Option<String> {
    element.get_child(name).and_then(element_text)
}

/// Trimmed text of an element, `None` when blank.
pub fn element_text(element: &Element) -> Option<String> {
    element
        .get_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Trimmed attribute value, `None` when absent or blank.
pub fn attribute(element: &Element, name: &str) -> Option<String> {
    element
        .attributes
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Hub booleans come as `true`/`false`, occasionally `1`/`0`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Treat empty strings from serde-decoded optional elements as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
