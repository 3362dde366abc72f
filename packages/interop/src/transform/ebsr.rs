//! Evidence-based selected response (EBSR) <-> two `choiceInteraction`s.
//!
//! QTI has no dedicated EBSR element; the convention is an item body with
//! two choice interactions, Part A (the answer) and Part B (the evidence),
//! bound to the `RESPONSE-A`/`RESPONSE-B` identifiers. The extractor
//! registers for `choiceInteraction` at a high priority with a narrow
//! predicate, so it shadows the plain choice rule exactly when an item body
//! carries two or more choice interactions.

use serde::{Deserialize, Serialize};

use super::choice::{self, ChoicePayload};
use super::QtiFragment;
use crate::error::{InteropError, Result};
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{find_children, tag_name};

pub const PART_A_RESPONSE_ID: &str = "RESPONSE-A";
pub const PART_B_RESPONSE_ID: &str = "RESPONSE-B";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EbsrPayload {
    pub part_a: ChoicePayload,
    pub part_b: ChoicePayload,
}

/// Render an EBSR model as two consecutive `choiceInteraction`s.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: EbsrPayload = model.parse_payload(item_id)?;

    let part_a = choice::build_fragment(&payload.part_a, PART_A_RESPONSE_ID);
    let part_b = choice::build_fragment(&payload.part_b, PART_B_RESPONSE_ID);

    Ok(QtiFragment {
        response_declaration: format!(
            "{}{}",
            part_a.response_declaration, part_b.response_declaration
        ),
        body: format!("{}{}", part_a.body, part_b.body),
    })
}

fn sibling_interactions<'a, 'input>(
    element: roxmltree::Node<'a, 'input>,
) -> Vec<roxmltree::Node<'a, 'input>> {
    element
        .parent_element()
        .map(|parent| find_children(parent, "choiceInteraction").collect())
        .unwrap_or_default()
}

pub struct EbsrExtractor;

impl ElementExtractor<PieModel> for EbsrExtractor {
    fn id(&self) -> &str {
        "builtin-ebsr"
    }

    fn name(&self) -> &str {
        "Evidence-based selected response"
    }

    fn priority(&self) -> i32 {
        300
    }

    fn element_types(&self) -> &[&str] {
        &["choiceInteraction"]
    }

    fn can_handle(
        &self,
        element: roxmltree::Node<'_, '_>,
        _ctx: &ExtractionContext<'_, '_>,
    ) -> Result<bool> {
        Ok(sibling_interactions(element).len() >= 2)
    }

    fn extract(
        &self,
        element: roxmltree::Node<'_, '_>,
        ctx: &ExtractionContext<'_, '_>,
    ) -> Result<PieModel> {
        let interactions = sibling_interactions(element);
        if interactions.len() < 2 {
            return Err(InteropError::InsufficientElements {
                item_id: ctx.item_id.clone(),
                element: tag_name(element).to_string(),
                expected: 2,
                found: interactions.len(),
            });
        }
        if interactions.len() > 2 {
            tracing::warn!(
                item_id = %ctx.item_id,
                count = interactions.len(),
                "item has more than two choice interactions, using the first two as EBSR parts"
            );
        }

        let payload = EbsrPayload {
            part_a: choice::parse_interaction(interactions[0], ctx)?,
            part_b: choice::parse_interaction(interactions[1], ctx)?,
        };
        PieModel::from_payload("1", elements::EBSR, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let part_empty = |key: &str| {
            data.payload
                .get(key)
                .and_then(|part| part.get("choices"))
                .and_then(|c| c.as_array())
                .is_none_or(Vec::is_empty)
        };
        if part_empty("partA") || part_empty("partB") {
            Validation::invalid(vec!["both EBSR parts need at least one choice".to_string()])
        } else {
            Validation::valid()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransformOptions;
    use crate::transform::choice::ChoiceEntry;
    use crate::xml::{attr_or, find_descendant};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn part(prompt: &str, correct_value: &str) -> ChoicePayload {
        ChoicePayload {
            prompt: Some(prompt.to_string()),
            choices: vec![
                ChoiceEntry {
                    value: "a".to_string(),
                    label: "First".to_string(),
                    correct: correct_value == "a",
                },
                ChoiceEntry {
                    value: "b".to_string(),
                    label: "Second".to_string(),
                    correct: correct_value == "b",
                },
            ],
            choice_mode: "radio".to_string(),
            shuffle: false,
        }
    }

    fn payload_fixture() -> EbsrPayload {
        EbsrPayload {
            part_a: part("What is the theme?", "a"),
            part_b: part("Which line supports your answer?", "b"),
        }
    }

    #[test]
    fn test_to_qti_emits_two_parts() {
        let model = PieModel::from_payload("1", elements::EBSR, &payload_fixture()).unwrap();
        let fragment = to_qti(&model, "item-1").unwrap();

        assert!(fragment
            .response_declaration
            .contains(r#"identifier="RESPONSE-A""#));
        assert!(fragment
            .response_declaration
            .contains(r#"identifier="RESPONSE-B""#));
        assert_eq!(fragment.body.matches("<choiceInteraction").count(), 2);
    }

    #[test]
    fn test_round_trip() {
        let payload = payload_fixture();
        let model = PieModel::from_payload("1", elements::EBSR, &payload).unwrap();
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

        let first = find_descendant(root, "choiceInteraction").unwrap();
        assert!(EbsrExtractor.can_handle(first, &ctx).unwrap());

        let extracted = EbsrExtractor.extract(first, &ctx).unwrap();
        assert_eq!(extracted.element, elements::EBSR);
        let recovered: EbsrPayload = extracted.parse_payload("item-1").unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn test_single_interaction_is_not_ebsr() {
        let xml = r#"<itemBody>
            <choiceInteraction responseIdentifier="RESPONSE" maxChoices="1">
                <simpleChoice identifier="a">A</simpleChoice>
            </choiceInteraction>
        </itemBody>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let interaction = find_descendant(doc.root_element(), "choiceInteraction").unwrap();
        let options = TransformOptions::default();
        let ctx = ExtractionContext::new("item-1", &options);

        assert!(!EbsrExtractor.can_handle(interaction, &ctx).unwrap());
    }

    #[test]
    fn test_extract_reports_insufficient_parts() {
        let xml = r#"<itemBody>
            <choiceInteraction responseIdentifier="RESPONSE" maxChoices="1">
                <simpleChoice identifier="a">A</simpleChoice>
            </choiceInteraction>
        </itemBody>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let interaction = find_descendant(doc.root_element(), "choiceInteraction").unwrap();
        let options = TransformOptions::default();
        let ctx = ExtractionContext::new("item-4", &options);

        let err = EbsrExtractor.extract(interaction, &ctx).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("item-4"));
        assert!(message.contains("choiceInteraction"));
    }
}
