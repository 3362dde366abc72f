//! `textEntryInteraction` <-> `@pie-element/text-entry`.
//!
//! The first correct response maps to the `correctResponse` block; remaining
//! alternates travel as `mapEntry` rows of a `mapping` block, which is how
//! QTI authoring tools commonly encode acceptable spellings.

use serde::{Deserialize, Serialize};

use super::QtiFragment;
use crate::config::DEFAULT_RESPONSE_ID;
use crate::error::Result;
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{
    attr, attr_or, escape_xml, find_child, find_children, has_class, inner_text, inner_xml,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEntryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Accepted answers; first entry is the primary one.
    #[serde(default)]
    pub correct_responses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_length: Option<u32>,
}

/// Render a text-entry model as a `textEntryInteraction`.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: TextEntryPayload = model.parse_payload(item_id)?;

    let mut declaration = format!(
        r#"<responseDeclaration identifier="{DEFAULT_RESPONSE_ID}" cardinality="single" baseType="string">"#
    );
    let (primary, alternates) = match payload.correct_responses.split_first() {
        Some((first, rest)) => (Some(first), rest),
        None => (None, &[] as &[String]),
    };
    if let Some(primary) = primary {
        declaration.push_str(&format!(
            "<correctResponse><value>{}</value></correctResponse>",
            escape_xml(primary)
        ));
    }
    if !alternates.is_empty() {
        declaration.push_str(r#"<mapping defaultValue="0">"#);
        for alternate in alternates {
            declaration.push_str(&format!(
                r#"<mapEntry mapKey="{}" mappedValue="1"/>"#,
                escape_xml(alternate)
            ));
        }
        declaration.push_str("</mapping>");
    }
    declaration.push_str("</responseDeclaration>");

    // textEntryInteraction is inline, so the prompt travels as a preceding
    // paragraph instead of a <prompt> child.
    let mut body = String::new();
    if let Some(prompt) = &payload.prompt {
        body.push_str(&format!(r#"<p class="prompt">{prompt}</p>"#));
    }
    body.push_str(&format!(
        r#"<p><textEntryInteraction responseIdentifier="{DEFAULT_RESPONSE_ID}""#
    ));
    if let Some(length) = payload.expected_length {
        body.push_str(&format!(r#" expectedLength="{length}""#));
    }
    body.push_str("/></p>");

    Ok(QtiFragment {
        response_declaration: declaration,
        body,
    })
}

pub struct TextEntryExtractor;

impl ElementExtractor<PieModel> for TextEntryExtractor {
    fn id(&self) -> &str {
        "builtin-text-entry"
    }

    fn name(&self) -> &str {
        "Text entry"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn element_types(&self) -> &[&str] {
        &["textEntryInteraction"]
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
        let response_id = attr_or(element, "responseIdentifier", DEFAULT_RESPONSE_ID);

        let mut correct_responses = Vec::new();
        if let Some(declaration) = ctx.declaration(response_id) {
            if let Some(correct) = find_child(declaration, "correctResponse") {
                correct_responses.extend(find_children(correct, "value").map(inner_text));
            }
            if let Some(mapping) = find_child(declaration, "mapping") {
                correct_responses.extend(
                    find_children(mapping, "mapEntry")
                        .filter_map(|entry| attr(entry, "mapKey"))
                        .map(str::to_string),
                );
            }
        }

        // The prompt paragraph precedes the interaction's enclosing <p>.
        let prompt = element
            .parent_element()
            .and_then(|p| p.parent_element())
            .and_then(|body| {
                find_children(body, "p")
                    .find(|n| has_class(*n, "prompt"))
                    .map(inner_xml)
            })
            .filter(|p| !p.is_empty());

        let expected_length = attr(element, "expectedLength").and_then(|v| v.parse().ok());

        let payload = TextEntryPayload {
            prompt,
            correct_responses,
            expected_length,
        };
        PieModel::from_payload("1", elements::TEXT_ENTRY, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let has_answers = data
            .payload
            .get("correctResponses")
            .and_then(|v| v.as_array())
            .is_some_and(|a| !a.is_empty());
        if has_answers {
            Validation::valid()
        } else {
            Validation::with_warnings(vec![
                "text entry has no correct responses; it cannot be auto-scored".to_string(),
            ])
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::xml::find_descendant;

    use super::*;
    use crate::model::TransformOptions;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn round_trip(payload: &TextEntryPayload) -> TextEntryPayload {
        let model = PieModel::from_payload("1", elements::TEXT_ENTRY, payload).unwrap();
        let fragment = to_qti(&model, "item-1").unwrap();
        let xml = format!(
            "<assessmentItem>{}<itemBody>{}</itemBody></assessmentItem>",
            fragment.response_declaration, fragment.body
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();

        let mut declarations = HashMap::new();
        for decl in find_children(root, "responseDeclaration") {
            declarations.insert(attr_or(decl, "identifier", "").to_string(), decl);
        }
        let options = TransformOptions::default();
        let ctx = ExtractionContext::new("item-1", &options).with_declarations(declarations);

        let interaction = find_descendant(root, "textEntryInteraction").unwrap();
        let extracted = TextEntryExtractor.extract(interaction, &ctx).unwrap();
        extracted.parse_payload("item-1").unwrap()
    }

    #[test]
    fn test_round_trip_with_alternates() {
        let payload = TextEntryPayload {
            prompt: Some("Name the largest ocean.".to_string()),
            correct_responses: vec![
                "Pacific".to_string(),
                "Pacific Ocean".to_string(),
                "the Pacific".to_string(),
            ],
            expected_length: Some(20),
        };
        assert_eq!(round_trip(&payload), payload);
    }

    #[test]
    fn test_round_trip_minimal() {
        let payload = TextEntryPayload {
            prompt: None,
            correct_responses: vec!["42".to_string()],
            expected_length: None,
        };
        assert_eq!(round_trip(&payload), payload);
    }

    #[test]
    fn test_alternates_become_map_entries() {
        let model = PieModel::from_payload(
            "1",
            elements::TEXT_ENTRY,
            &TextEntryPayload {
                prompt: None,
                correct_responses: vec!["a".to_string(), "b".to_string()],
                expected_length: None,
            },
        )
        .unwrap();
        let fragment = to_qti(&model, "item-1").unwrap();
        assert!(fragment
            .response_declaration
            .contains("<correctResponse><value>a</value></correctResponse>"));
        assert!(fragment
            .response_declaration
            .contains(r#"<mapEntry mapKey="b" mappedValue="1"/>"#));
    }

    #[test]
    fn test_validation_warns_without_answers() {
        let model = PieModel::from_payload(
            "1",
            elements::TEXT_ENTRY,
            &TextEntryPayload {
                prompt: None,
                correct_responses: Vec::new(),
                expected_length: None,
            },
        )
        .unwrap();
        let validation = TextEntryExtractor.validate(&model);
        assert!(validation.valid);
        assert!(!validation.warnings.is_empty());
    }
}
