//! `matchInteraction` <-> `@pie-element/match`.
//!
//! Rows come from the first `simpleMatchSet`, columns from the second, and
//! the correct pairing travels as `directedPair` values ("row column").

use serde::{Deserialize, Serialize};

use super::{declared_correct_values, response_declaration, QtiFragment};
use crate::config::DEFAULT_RESPONSE_ID;
use crate::error::{InteropError, Result};
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{attr, attr_bool, attr_or, escape_xml, find_child, find_children, inner_xml};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub rows: Vec<MatchSetEntry>,
    #[serde(default)]
    pub columns: Vec<MatchSetEntry>,
    #[serde(default)]
    pub correct: Vec<MatchPair>,
    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSetEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub source: String,
    pub target: String,
}

/// Render a match model as a `matchInteraction`.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: MatchPayload = model.parse_payload(item_id)?;

    let pairs: Vec<String> = payload
        .correct
        .iter()
        .map(|pair| format!("{} {}", pair.source, pair.target))
        .collect();

    let mut body = format!(
        r#"<matchInteraction responseIdentifier="{DEFAULT_RESPONSE_ID}" shuffle="{}" maxAssociations="0">"#,
        payload.shuffle
    );
    if let Some(prompt) = &payload.prompt {
        body.push_str(&format!("<prompt>{prompt}</prompt>"));
    }
    for set in [&payload.rows, &payload.columns] {
        body.push_str("<simpleMatchSet>");
        for entry in set {
            body.push_str(&format!(
                r#"<simpleAssociableChoice identifier="{}" matchMax="1">{}</simpleAssociableChoice>"#,
                escape_xml(&entry.id),
                entry.label
            ));
        }
        body.push_str("</simpleMatchSet>");
    }
    body.push_str("</matchInteraction>");

    Ok(QtiFragment {
        response_declaration: response_declaration(
            DEFAULT_RESPONSE_ID,
            "multiple",
            "directedPair",
            &pairs,
        ),
        body,
    })
}

pub struct MatchExtractor;

impl ElementExtractor<PieModel> for MatchExtractor {
    fn id(&self) -> &str {
        "builtin-match"
    }

    fn name(&self) -> &str {
        "Match table"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn element_types(&self) -> &[&str] {
        &["matchInteraction"]
    }

    fn can_handle(
        &self,
        _element: roxmltree::Node<'_, '_>,
        _ctx: &ExtractionContext<'_, '_>,
    ) -> Result<bool> {
        Ok(true)
    }

    fn extract(
        &self,
        element: roxmltree::Node<'_, '_>,
        ctx: &ExtractionContext<'_, '_>,
    ) -> Result<PieModel> {
        let sets: Vec<_> = find_children(element, "simpleMatchSet").collect();
        if sets.len() < 2 {
            return Err(InteropError::InsufficientElements {
                item_id: ctx.item_id.clone(),
                element: "simpleMatchSet".to_string(),
                expected: 2,
                found: sets.len(),
            });
        }

        let parse_set = |set: roxmltree::Node<'_, '_>| -> Result<Vec<MatchSetEntry>> {
            find_children(set, "simpleAssociableChoice")
                .map(|node| {
                    let id = attr(node, "identifier").ok_or_else(|| InteropError::Extraction {
                        item_id: ctx.item_id.clone(),
                        message: "simpleAssociableChoice is missing an identifier attribute"
                            .to_string(),
                    })?;
                    Ok(MatchSetEntry {
                        id: id.to_string(),
                        label: inner_xml(node),
                    })
                })
                .collect()
        };

        let response_id = attr_or(element, "responseIdentifier", DEFAULT_RESPONSE_ID);
        let correct = declared_correct_values(ctx, response_id)
            .iter()
            .filter_map(|value| {
                let mut parts = value.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(source), Some(target)) => Some(MatchPair {
                        source: source.to_string(),
                        target: target.to_string(),
                    }),
                    _ => None,
                }
            })
            .collect();

        let payload = MatchPayload {
            prompt: find_child(element, "prompt")
                .map(inner_xml)
                .filter(|p| !p.is_empty()),
            rows: parse_set(sets[0])?,
            columns: parse_set(sets[1])?,
            correct,
            shuffle: attr_bool(element, "shuffle", false),
        };
        PieModel::from_payload("1", elements::MATCH, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let count = |key: &str| {
            data.payload
                .get(key)
                .and_then(|v| v.as_array())
                .map_or(0, Vec::len)
        };
        if count("rows") == 0 || count("columns") == 0 {
            return Validation::invalid(vec![
                "match interaction needs at least one row and one column".to_string(),
            ]);
        }
        if count("correct") == 0 {
            return Validation::with_warnings(vec![
                "no correct pairs declared; the item cannot be auto-scored".to_string(),
            ]);
        }
        Validation::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransformOptions;
    use crate::xml::find_descendant;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn payload_fixture() -> MatchPayload {
        MatchPayload {
            prompt: Some("Match each country to its capital.".to_string()),
            rows: vec![
                MatchSetEntry {
                    id: "r1".to_string(),
                    label: "France".to_string(),
                },
                MatchSetEntry {
                    id: "r2".to_string(),
                    label: "Japan".to_string(),
                },
            ],
            columns: vec![
                MatchSetEntry {
                    id: "c1".to_string(),
                    label: "Paris".to_string(),
                },
                MatchSetEntry {
                    id: "c2".to_string(),
                    label: "Tokyo".to_string(),
                },
            ],
            correct: vec![
                MatchPair {
                    source: "r1".to_string(),
                    target: "c1".to_string(),
                },
                MatchPair {
                    source: "r2".to_string(),
                    target: "c2".to_string(),
                },
            ],
            shuffle: true,
        }
    }

    #[test]
    fn test_round_trip() {
        let payload = payload_fixture();
        let model = PieModel::from_payload("1", elements::MATCH, &payload).unwrap();
        let fragment = to_qti(&model, "item-1").unwrap();
        assert!(fragment.response_declaration.contains("directedPair"));
        assert!(fragment.response_declaration.contains("<value>r1 c1</value>"));

        let xml = format!(
            "<assessmentItem>{}<itemBody>{}</itemBody></assessmentItem>",
            fragment.response_declaration, fragment.body
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();

        let mut declarations = HashMap::new();
        for decl in crate::xml::find_children(root, "responseDeclaration") {
            declarations.insert(attr_or(decl, "identifier", "").to_string(), decl);
        }
        let options = TransformOptions::default();
        let ctx = ExtractionContext::new("item-1", &options).with_declarations(declarations);

        let interaction = find_descendant(root, "matchInteraction").unwrap();
        let extracted = MatchExtractor.extract(interaction, &ctx).unwrap();
        let recovered: MatchPayload = extracted.parse_payload("item-1").unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn test_single_match_set_is_insufficient() {
        let xml = r#"<itemBody><matchInteraction responseIdentifier="RESPONSE">
            <simpleMatchSet>
                <simpleAssociableChoice identifier="a" matchMax="1">A</simpleAssociableChoice>
            </simpleMatchSet>
        </matchInteraction></itemBody>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let interaction = find_descendant(doc.root_element(), "matchInteraction").unwrap();
        let options = TransformOptions::default();
        let ctx = ExtractionContext::new("item-9", &options);

        let err = MatchExtractor.extract(interaction, &ctx).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("item-9"));
        assert!(message.contains("simpleMatchSet"));
        assert!(message.contains('2'));
    }

    #[test]
    fn test_validation_requires_both_sets() {
        let model = PieModel::from_payload(
            "1",
            elements::MATCH,
            &serde_json::json!({"rows": [{"id": "r", "label": "R"}], "columns": []}),
        )
        .unwrap();
        assert!(!MatchExtractor.validate(&model).valid);
    }
}
