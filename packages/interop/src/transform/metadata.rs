//! Round-trip of item `searchMetaData` through QTI markup.
//!
//! Metadata serializes twice: once as human/interop-readable `<qti-metadata>`
//! entries (arrays flattened to comma-joined values), and once as an opaque
//! `<pie:sourceModel>` extension carrying the original JSON verbatim. On the
//! reverse transform the extension is authoritative; the flattened entries
//! are only a fallback when the extension is absent.

use roxmltree::Node;
use serde_json::{Map, Value};

use crate::xml::{escape_xml, find_children, find_descendant, inner_text};

/// Serialize metadata to the two-block markup described above.
#[must_use]
pub fn metadata_to_xml(meta: &Map<String, Value>) -> String {
    let mut out = String::from("<qti-metadata>");
    for (name, value) in meta {
        let (data_type, flattened) = flatten_value(value);
        out.push_str(&format!(
            r#"<entry name="{}" value="{}" data-type="{}"/>"#,
            escape_xml(name),
            escape_xml(&flattened),
            data_type
        ));
    }
    out.push_str("</qti-metadata>");

    // serde_json::Map serialization is deterministic, so the extension block
    // is stable across runs.
    let source_json = Value::Object(meta.clone()).to_string();
    out.push_str(&format!(
        "<pie:sourceModel>{}</pie:sourceModel>",
        escape_xml(&source_json)
    ));
    out
}

/// Recover metadata from a parsed item.
///
/// Prefers the `<pie:sourceModel>` extension (exact reconstruction, including
/// nested objects, empty arrays and zero values); falls back to the flattened
/// `<qti-metadata>` entries.
#[must_use]
pub fn metadata_from_item(root: Node<'_, '_>) -> Option<Map<String, Value>> {
    if let Some(source) = find_descendant(root, "sourceModel") {
        let text = inner_text(source);
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text) {
            return Some(map);
        }
        tracing::warn!("pie:sourceModel present but not a JSON object, falling back to entries");
    }

    let block = find_descendant(root, "qti-metadata")?;
    let mut map = Map::new();
    for entry in find_children(block, "entry") {
        let Some(name) = entry.attribute("name") else {
            continue;
        };
        let value = entry.attribute("value").unwrap_or_default();
        let parsed = match entry.attribute("data-type").unwrap_or("string") {
            "number" => parse_number(value),
            "array" => Value::Array(
                value
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            ),
            _ => Value::String(value.to_string()),
        };
        map.insert(name.to_string(), parsed);
    }
    Some(map)
}

fn flatten_value(value: &Value) -> (&'static str, String) {
    match value {
        Value::String(s) => ("string", s.clone()),
        Value::Number(n) => ("number", n.to_string()),
        Value::Bool(b) => ("string", b.to_string()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            ("array", joined)
        }
        Value::Object(_) => ("string", value.to_string()),
        Value::Null => ("string", String::new()),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_number(value: &str) -> Value {
    if let Ok(i) = value.parse::<i64>() {
        return Value::Number(i.into());
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}
