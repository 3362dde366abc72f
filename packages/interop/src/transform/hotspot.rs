//! `hotspotInteraction` <-> `@pie-element/hotspot`.
//!
//! QTI requires explicit pixel dimensions on the `<object>` carrying the
//! background image. A hotspot model without dimensions therefore fails the
//! PIE-to-QTI direction with a remediation hint instead of emitting markup
//! that players would reject.

use serde::{Deserialize, Serialize};

use super::{declared_correct_values, response_declaration, QtiFragment};
use crate::config::DEFAULT_RESPONSE_ID;
use crate::error::{InteropError, Result};
use crate::extract::{ElementExtractor, ExtractionContext, Validation};
use crate::model::{elements, PieModel};
use crate::xml::{attr, attr_f64_opt, attr_or, escape_xml, find_child, find_children, inner_xml};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub shapes: Vec<HotspotShape>,
    /// Checkbox-style selection when true; single selection otherwise.
    #[serde(default)]
    pub multiple_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotShape {
    pub id: String,
    /// QTI shape keyword: "rect", "circle" or "poly".
    pub shape: String,
    /// QTI coordinate string, e.g. "10,10,50,50" for a rect.
    pub coords: String,
    #[serde(default)]
    pub correct: bool,
}

/// Render a hotspot model as a `hotspotInteraction`.
///
/// # Errors
/// [`InteropError::MissingDimensions`] when the payload has no usable
/// width/height for the background image.
pub fn to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    let payload: HotspotPayload = model.parse_payload(item_id)?;

    let dimensions = payload
        .dimensions
        .as_ref()
        .filter(|d| d.width > 0.0 && d.height > 0.0)
        .ok_or_else(|| InteropError::MissingDimensions {
            item_id: item_id.to_string(),
            image: payload.image_url.clone(),
        })?;

    let correct: Vec<String> = payload
        .shapes
        .iter()
        .filter(|s| s.correct)
        .map(|s| s.id.clone())
        .collect();
    let (cardinality, max_choices) = if payload.multiple_correct {
        ("multiple", 0)
    } else {
        ("single", 1)
    };

    let mut body = format!(
        r#"<hotspotInteraction responseIdentifier="{DEFAULT_RESPONSE_ID}" maxChoices="{max_choices}">"#
    );
    if let Some(prompt) = &payload.prompt {
        body.push_str(&format!("<prompt>{prompt}</prompt>"));
    }
    body.push_str(&format!(
        r#"<object type="image/png" data="{}" width="{}" height="{}"/>"#,
        escape_xml(&payload.image_url),
        dimensions.width,
        dimensions.height
    ));
    for shape in &payload.shapes {
        body.push_str(&format!(
            r#"<hotspotChoice identifier="{}" shape="{}" coords="{}"/>"#,
            escape_xml(&shape.id),
            escape_xml(&shape.shape),
            escape_xml(&shape.coords)
        ));
    }
    body.push_str("</hotspotInteraction>");

    Ok(QtiFragment {
        response_declaration: response_declaration(
            DEFAULT_RESPONSE_ID,
            cardinality,
            "identifier",
            &correct,
        ),
        body,
    })
}

pub struct HotspotExtractor;

impl ElementExtractor<PieModel> for HotspotExtractor {
    fn id(&self) -> &str {
        "builtin-hotspot"
    }

    fn name(&self) -> &str {
        "Hotspot"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn element_types(&self) -> &[&str] {
        &["hotspotInteraction"]
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
        let object = find_child(element, "object").ok_or_else(|| InteropError::MissingElement {
            element: "object".to_string(),
            item_id: ctx.item_id.clone(),
        })?;
        let image_url = attr_or(object, "data", "").to_string();

        let dimensions = match (attr_f64_opt(object, "width"), attr_f64_opt(object, "height")) {
            (Some(width), Some(height)) if width > 0.0 && height > 0.0 => {
                Some(Dimensions { width, height })
            }
            _ => {
                return Err(InteropError::MissingDimensions {
                    item_id: ctx.item_id.clone(),
                    image: image_url,
                })
            }
        };

        let response_id = attr_or(element, "responseIdentifier", DEFAULT_RESPONSE_ID);
        let correct = declared_correct_values(ctx, response_id);

        let mut shapes = Vec::new();
        for node in find_children(element, "hotspotChoice") {
            let id = attr(node, "identifier").ok_or_else(|| InteropError::Extraction {
                item_id: ctx.item_id.clone(),
                message: "hotspotChoice is missing an identifier attribute".to_string(),
            })?;
            shapes.push(HotspotShape {
                id: id.to_string(),
                shape: attr_or(node, "shape", "rect").to_string(),
                coords: attr_or(node, "coords", "").to_string(),
                correct: correct.iter().any(|c| c == id),
            });
        }

        let payload = HotspotPayload {
            prompt: find_child(element, "prompt")
                .map(inner_xml)
                .filter(|p| !p.is_empty()),
            image_url,
            dimensions,
            shapes,
            multiple_correct: attr_or(element, "maxChoices", "1") != "1",
        };
        PieModel::from_payload("1", elements::HOTSPOT, &payload)
    }

    fn validate(&self, data: &PieModel) -> Validation {
        let empty_image = data
            .payload
            .get("imageUrl")
            .and_then(|v| v.as_str())
            .is_none_or(str::is_empty);
        if empty_image {
            return Validation::invalid(vec!["hotspot has no background image".to_string()]);
        }
        let shape_count = data
            .payload
            .get("shapes")
            .and_then(|v| v.as_array())
            .map_or(0, Vec::len);
        if shape_count == 0 {
            return Validation::invalid(vec!["hotspot has no selectable shapes".to_string()]);
        }
        Validation::valid()
    }
}
