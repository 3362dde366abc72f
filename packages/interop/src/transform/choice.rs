//! `choiceInteraction` <-> `@pie-element/multiple-choice`.

use serde::{Deserialize, Serialize};

use super::{declared_correct_values, response_declaration, QtiFragment};
use crate::config::DEFAULT_RESPONSE_ID;
use crate::error::{InteropError, Result};
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{attr, attr_bool, attr_or, find_child, find_children, inner_xml};

/// Payload of a multiple-choice model. Choice labels and the prompt carry
/// item-authored HTML and are embedded in generated markup verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoicePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceEntry>,
    /// "radio" (single response) or "checkbox" (multiple responses).
    #[serde(default = "default_choice_mode")]
    pub choice_mode: String,
    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceEntry {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub correct: bool,
}

fn default_choice_mode() -> String {
    "radio".to_string()
}

impl ChoicePayload {
    fn is_multiple(&self) -> bool {
        self.choice_mode == "checkbox"
    }
}

/// Render a multiple-choice model as a `choiceInteraction`.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: ChoicePayload = model.parse_payload(item_id)?;
    Ok(build_fragment(&payload, DEFAULT_RESPONSE_ID))
}

/// Shared with the EBSR transformer, which renders two parts with distinct
/// response identifiers.
pub(crate) fn build_fragment(payload: &ChoicePayload, response_id: &str) -> QtiFragment {
    let correct: Vec<String> = payload
        .choices
        .iter()
        .filter(|c| c.correct)
        .map(|c| c.value.clone())
        .collect();
    let (cardinality, max_choices) = if payload.is_multiple() {
        ("multiple", 0)
    } else {
        ("single", 1)
    };

    let mut body = format!(
        r#"<choiceInteraction responseIdentifier="{}" shuffle="{}" maxChoices="{}">"#,
        response_id, payload.shuffle, max_choices
    );
    if let Some(prompt) = &payload.prompt {
        body.push_str(&format!("<prompt>{prompt}</prompt>"));
    }
    for choice in &payload.choices {
        body.push_str(&format!(
            r#"<simpleChoice identifier="{}">{}</simpleChoice>"#,
            crate::xml::escape_xml(&choice.value),
            choice.label
        ));
    }
    body.push_str("</choiceInteraction>");

    QtiFragment {
        response_declaration: response_declaration(
            response_id,
            cardinality,
            "identifier",
            &correct,
        ),
        body,
    }
}

/// Parse one `choiceInteraction` element into a payload. Also used by the
/// EBSR extractor for each of its two parts.
pub(crate) fn parse_interaction(
    element: roxmltree::Node<'_, '_>,
    ctx: &ExtractionContext<'_, '_>,
) -> Result<ChoicePayload> {
    let response_id = attr_or(element, "responseIdentifier", DEFAULT_RESPONSE_ID);
    let correct = declared_correct_values(ctx, response_id);

    let mut choices = Vec::new();
    for node in find_children(element, "simpleChoice") {
        let value = attr(node, "identifier").ok_or_else(|| InteropError::Extraction {
            item_id: ctx.item_id.clone(),
            message: "simpleChoice is missing an identifier attribute".to_string(),
        })?;
        choices.push(ChoiceEntry {
            value: value.to_string(),
            label: inner_xml(node),
            correct: correct.iter().any(|c| c == value),
        });
    }

    // maxChoices="1" means single response; anything else (including the
    // attribute's absence with a multiple-cardinality declaration) is treated
    // as checkbox mode.
    let choice_mode = if attr_or(element, "maxChoices", "1") == "1" {
        "radio"
    } else {
        "checkbox"
    };

    Ok(ChoicePayload {
        prompt: find_child(element, "prompt").map(inner_xml).filter(|p| !p.is_empty()),
        choices,
        choice_mode: choice_mode.to_string(),
        shuffle: attr_bool(element, "shuffle", false),
    })
}

/// Broad built-in rule for `choiceInteraction`. Low priority, so narrower
/// rules (EBSR, plugin likert-style rules) can shadow it.
pub struct ChoiceExtractor;

impl ElementExtractor<PieModel> for ChoiceExtractor {
    fn id(&self) -> &str {
        "builtin-choice"
    }

    fn name(&self) -> &str {
        "Multiple choice"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn element_types(&self) -> &[&str] {
        &["choiceInteraction"]
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
        let payload = parse_interaction(element, ctx)?;
        PieModel::from_payload("1", elements::MULTIPLE_CHOICE, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let Some(choices) = data.payload.get("choices").and_then(|c| c.as_array()) else {
            return Validation::invalid(vec!["choice model has no choices array".to_string()]);
        };
        if choices.is_empty() {
            return Validation::invalid(vec![
                "choiceInteraction has no simpleChoice children".to_string(),
            ]);
        }
        let any_correct = choices
            .iter()
            .any(|c| c.get("correct").and_then(serde_json::Value::as_bool) == Some(true));
        if any_correct {
            Validation::valid()
        } else {
            Validation::with_warnings(vec!["no choice is marked correct".to_string()])
        }
    }
}
