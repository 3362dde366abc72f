//! `associateInteraction` <-> `@pie-element/categorize` (best effort).
//!
//! QTI's associate interaction declares a flat pool of associable choices
//! plus correct pairs; PIE categorize distinguishes categories from the
//! choices dropped into them. Going to QTI, categories are emitted with
//! `matchMax="0"` (unlimited) and choices with `matchMax="1"`. Coming back,
//! that distinction is gone from the pool itself, so categories are inferred
//! from the correct pairs: an identifier that appears as the right-hand
//! member of pairs at least as often as the left is treated as a category.
//! The mapping is lossy for pathological pair sets and is reported as
//! best-effort fidelity by the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{declared_correct_values, response_declaration, QtiFragment};
use crate::config::DEFAULT_RESPONSE_ID;
use crate::error::{InteropError, Result};
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{attr, attr_or, escape_xml, find_child, find_children, inner_xml};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategorizeEntry>,
    #[serde(default)]
    pub choices: Vec<CategorizeEntry>,
    #[serde(default)]
    pub correct_response: Vec<CategoryAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizeEntry {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category: String,
    pub choices: Vec<String>,
}

/// Render a categorize model as an `associateInteraction`.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: CategorizePayload = model.parse_payload(item_id)?;

    let mut pairs = Vec::new();
    for assignment in &payload.correct_response {
        for choice in &assignment.choices {
            pairs.push(format!("{} {}", choice, assignment.category));
        }
    }

    let mut body = format!(
        r#"<associateInteraction responseIdentifier="{DEFAULT_RESPONSE_ID}" shuffle="false" maxAssociations="0">"#
    );
    if let Some(prompt) = &payload.prompt {
        body.push_str(&format!("<prompt>{prompt}</prompt>"));
    }
    for entry in &payload.choices {
        body.push_str(&format!(
            r#"<simpleAssociableChoice identifier="{}" matchMax="1">{}</simpleAssociableChoice>"#,
            escape_xml(&entry.id),
            entry.label
        ));
    }
    for entry in &payload.categories {
        body.push_str(&format!(
            r#"<simpleAssociableChoice identifier="{}" matchMax="0">{}</simpleAssociableChoice>"#,
            escape_xml(&entry.id),
            entry.label
        ));
    }
    body.push_str("</associateInteraction>");

    Ok(QtiFragment {
        response_declaration: response_declaration(
            DEFAULT_RESPONSE_ID,
            "multiple",
            "pair",
            &pairs,
        ),
        body,
    })
}

pub struct CategorizeExtractor;

impl ElementExtractor<PieModel> for CategorizeExtractor {
    fn id(&self) -> &str {
        "builtin-categorize"
    }

    fn name(&self) -> &str {
        "Categorize"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn element_types(&self) -> &[&str] {
        &["associateInteraction"]
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
        let mut pool = Vec::new();
        for node in find_children(element, "simpleAssociableChoice") {
            let id = attr(node, "identifier").ok_or_else(|| InteropError::Extraction {
                item_id: ctx.item_id.clone(),
                message: "simpleAssociableChoice is missing an identifier attribute".to_string(),
            })?;
            pool.push(CategorizeEntry {
                id: id.to_string(),
                label: inner_xml(node),
            });
        }

        let response_id = attr_or(element, "responseIdentifier", DEFAULT_RESPONSE_ID);
        let pairs: Vec<(String, String)> = declared_correct_values(ctx, response_id)
            .iter()
            .filter_map(|value| {
                let mut parts = value.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(left), Some(right)) => Some((left.to_string(), right.to_string())),
                    _ => None,
                }
            })
            .collect();

        let mut left_counts: HashMap<&str, usize> = HashMap::new();
        let mut right_counts: HashMap<&str, usize> = HashMap::new();
        for (left, right) in &pairs {
            *left_counts.entry(left).or_default() += 1;
            *right_counts.entry(right).or_default() += 1;
        }
        let is_category = |id: &str| {
            let rights = right_counts.get(id).copied().unwrap_or(0);
            rights > 0 && rights >= left_counts.get(id).copied().unwrap_or(0)
        };

        let (categories, choices): (Vec<_>, Vec<_>) =
            pool.into_iter().partition(|entry| is_category(&entry.id));

        let mut assignments: Vec<CategoryAssignment> = categories
            .iter()
            .map(|category| CategoryAssignment {
                category: category.id.clone(),
                choices: Vec::new(),
            })
            .collect();
        for (left, right) in &pairs {
            let slot = assignments
                .iter()
                .position(|a| a.category == *right)
                .or_else(|| assignments.iter().position(|a| a.category == *left));
            match slot {
                Some(index) => {
                    let assignment = &mut assignments[index];
                    let choice = if assignment.category == *right { left } else { right };
                    assignment.choices.push(choice.clone());
                }
                None => {
                    tracing::warn!(
                        item_id = %ctx.item_id,
                        pair = %format!("{left} {right}"),
                        "correct pair references no inferred category, dropping it"
                    );
                }
            }
        }

        let payload = CategorizePayload {
            prompt: find_child(element, "prompt")
                .map(inner_xml)
                .filter(|p| !p.is_empty()),
            categories,
            choices,
            correct_response: assignments,
        };
        PieModel::from_payload("1", elements::CATEGORIZE, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let count = |key: &str| {
            data.payload
                .get(key)
                .and_then(|v| v.as_array())
                .map_or(0, Vec::len)
        };
        if count("categories") == 0 {
            return Validation::invalid(vec![
                "no categories could be inferred from the correct pairs".to_string(),
            ]);
        }
        Validation::with_warnings(vec![
            "categories inferred from associate pairs; review before publishing".to_string(),
        ])
    }
}
