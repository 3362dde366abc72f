//! `sliderInteraction` <-> `@pie-element/slider`.

use serde::{Deserialize, Serialize};

use super::{response_declaration, QtiFragment};
use crate::config::DEFAULT_RESPONSE_ID;
use crate::error::Result;
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{attr_f64, attr_f64_opt, attr_or, find_child, inner_text, inner_xml};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliderPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default)]
    pub correct: f64,
}

fn default_step() -> f64 {
    1.0
}

/// Render a slider model as a `sliderInteraction`.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: SliderPayload = model.parse_payload(item_id)?;

    let mut body = format!(
        r#"<sliderInteraction responseIdentifier="{DEFAULT_RESPONSE_ID}" lowerBound="{}" upperBound="{}" step="{}">"#,
        payload.min, payload.max, payload.step
    );
    if let Some(prompt) = &payload.prompt {
        body.push_str(&format!("<prompt>{prompt}</prompt>"));
    }
    body.push_str("</sliderInteraction>");

    Ok(QtiFragment {
        response_declaration: response_declaration(
            DEFAULT_RESPONSE_ID,
            "single",
            "float",
            &[payload.correct.to_string()],
        ),
        body,
    })
}

pub struct SliderExtractor;

impl ElementExtractor<PieModel> for SliderExtractor {
    fn id(&self) -> &str {
        "builtin-slider"
    }

    fn name(&self) -> &str {
        "Slider"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn element_types(&self) -> &[&str] {
        &["sliderInteraction"]
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
        let correct = ctx
            .declaration(response_id)
            .and_then(|decl| find_child(decl, "correctResponse"))
            .and_then(|correct| find_child(correct, "value"))
            .and_then(|value| inner_text(value).parse().ok())
            .unwrap_or(0.0);

        let payload = SliderPayload {
            prompt: find_child(element, "prompt")
                .map(inner_xml)
                .filter(|p| !p.is_empty()),
            min: attr_f64(element, "lowerBound", 0.0),
            max: attr_f64(element, "upperBound", 100.0),
            step: attr_f64_opt(element, "step").unwrap_or_else(default_step),
            correct,
        };
        PieModel::from_payload("1", elements::SLIDER, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let get = |key: &str| data.payload.get(key).and_then(serde_json::Value::as_f64);
        match (get("min"), get("max")) {
            (Some(min), Some(max)) if min < max => Validation::valid(),
            (Some(_), Some(_)) => Validation::invalid(vec![
                "slider min must be strictly below max".to_string(),
            ]),
            _ => Validation::invalid(vec!["slider is missing min or max".to_string()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransformOptions;
    use crate::xml::{find_children, find_descendant};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn round_trip(payload: &SliderPayload) -> SliderPayload {
        let model = PieModel::from_payload("1", elements::SLIDER, payload).unwrap();
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

        let interaction = find_descendant(root, "sliderInteraction").unwrap();
        let extracted = SliderExtractor.extract(interaction, &ctx).unwrap();
        extracted.parse_payload("item-1").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let payload = SliderPayload {
            prompt: Some("Estimate the mass in kilograms.".to_string()),
            min: 0.0,
            max: 10.0,
            step: 0.5,
            correct: 7.5,
        };
        assert_eq!(round_trip(&payload), payload);
    }

    #[test]
    fn test_missing_correct_defaults_to_zero() {
        let xml = r#"<itemBody><sliderInteraction responseIdentifier="RESPONSE"
            lowerBound="1" upperBound="5" step="1"/></itemBody>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let interaction =
            find_descendant(doc.root_element(), "sliderInteraction").unwrap();
        let options = TransformOptions::default();
        let ctx = ExtractionContext::new("item-1", &options);

        let model = SliderExtractor.extract(interaction, &ctx).unwrap();
        let payload: SliderPayload = model.parse_payload("item-1").unwrap();
        assert!((payload.correct - 0.0).abs() < f64::EPSILON);
        assert!((payload.min - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validation_rejects_inverted_bounds() {
        let model = PieModel::from_payload(
            "1",
            elements::SLIDER,
            &SliderPayload {
                prompt: None,
                min: 5.0,
                max: 1.0,
                step: 1.0,
                correct: 2.0,
            },
        )
        .unwrap();
        assert!(!SliderExtractor.validate(&model).valid);
    }
}
