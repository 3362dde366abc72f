//! Element accessor utilities over parsed XML trees.
//!
//! This module is the single place where the engine touches the underlying
//! XML parser (`roxmltree`). Everything else reads elements through these
//! helpers: children by tag, attributes with typed defaults, class lists and
//! text content. Escaping for generated markup lives here too so all output
//! paths share one discipline.

use roxmltree::Node;

/// Get the tag name without namespace prefix.
///
/// # Examples
/// ```
/// use roxmltree::Document;
/// use pie_interop::xml::tag_name;
///
/// let doc = Document::parse(r#"<itemBody><p/></itemBody>"#).unwrap();
/// assert_eq!(tag_name(doc.root_element()), "itemBody");
/// ```
pub fn tag_name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

/// Find the first child element with the given tag name.
pub fn find_child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && tag_name(*child) == tag)
}

/// Find all child elements with the given tag name.
pub fn find_children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && tag_name(*child) == tag)
}

/// Find the first descendant element with the given tag name.
pub fn find_descendant<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.is_element() && tag_name(*n) == tag)
}

/// All element children of a node.
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

/// Get an attribute value.
pub fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name)
}

/// Get an attribute value with a string default.
pub fn attr_or<'a>(node: Node<'a, '_>, name: &str, default: &'a str) -> &'a str {
    node.attribute(name).unwrap_or(default)
}

/// Get an attribute as a boolean with a default.
///
/// Accepts "true"/"false" and "1"/"0"; anything else falls back to the default.
pub fn attr_bool(node: Node<'_, '_>, name: &str, default: bool) -> bool {
    match node.attribute(name) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

/// Get an attribute as a number with a default.
pub fn attr_f64(node: Node<'_, '_>, name: &str, default: f64) -> f64 {
    node.attribute(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get an attribute parsed as a number, or `None` when absent or unparseable.
pub fn attr_f64_opt(node: Node<'_, '_>, name: &str) -> Option<f64> {
    node.attribute(name).and_then(|v| v.parse().ok())
}

/// Get the class list of a node.
pub fn class_list<'a>(node: Node<'a, '_>) -> Vec<&'a str> {
    node.attribute("class")
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default()
}

/// Check whether a node carries a class.
pub fn has_class(node: Node<'_, '_>, class: &str) -> bool {
    class_list(node).contains(&class)
}

/// Concatenated text content of a node and all its descendants, trimmed.
#[must_use]
pub fn inner_text(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for descendant in node.descendants().filter(Node::is_text) {
        if let Some(text) = descendant.text() {
            out.push_str(text);
        }
    }
    out.trim().to_string()
}

/// Serialized markup of a node's children (the node's "inner HTML").
///
/// Rebuilt from the parsed tree rather than sliced from the source, so
/// entity references come back normalized.
#[must_use]
pub fn inner_xml(node: Node<'_, '_>) -> String {
    let mut out = String::new();
    for child in node.children() {
        write_node(child, &mut out);
    }
    out.trim().to_string()
}

fn write_node(node: Node<'_, '_>, out: &mut String) {
    if node.is_text() {
        if let Some(text) = node.text() {
            out.push_str(&escape_xml(text));
        }
        return;
    }
    if !node.is_element() {
        return;
    }

    let name = tag_name(node);
    out.push('<');
    out.push_str(name);
    for attribute in node.attributes() {
        out.push(' ');
        out.push_str(attribute.name());
        out.push_str("=\"");
        out.push_str(&escape_xml(attribute.value()));
        out.push('"');
    }
    if node.children().next().is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in node.children() {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Escape the five XML-special characters in text and attribute values.
#[must_use]
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
