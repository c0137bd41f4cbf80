//! Namespace-agnostic helpers over [roxmltree].
//!
//! Capabilities documents vary in their prefixes (`wfs:`, `ows:`, none) from
//! one server and version to the next, so elements are matched on their local
//! name only.

use crate::Result;
use roxmltree::{Document, Node, ParsingOptions};

pub(super) fn parse(text: &str) -> Result<Document<'_>> {
    // WMS 1.1.1 capabilities declare a DTD.
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let document = Document::parse_with_options(text, options)?;
    Ok(document)
}

pub(super) fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

pub(super) fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'a str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

pub(super) fn descendant<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

/// Returns the trimmed text of a child, if it has any.
pub(super) fn text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(own_text)
}

/// Returns the trimmed texts of every child with this name.
pub(super) fn texts(node: Node<'_, '_>, name: &str) -> Vec<String> {
    children(node, name).filter_map(own_text).collect()
}

/// Returns the keywords under a `Keywords` (OWS) or `KeywordList` (WMS)
/// child.
pub(super) fn keywords(node: Node<'_, '_>) -> Vec<String> {
    children(node, "Keywords")
        .chain(children(node, "KeywordList"))
        .flat_map(|list| texts(list, "Keyword"))
        .collect()
}

pub(super) fn own_text(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

pub(super) fn attribute_f64(node: Node<'_, '_>, name: &str) -> Option<f64> {
    node.attribute(name).and_then(|value| value.trim().parse().ok())
}
