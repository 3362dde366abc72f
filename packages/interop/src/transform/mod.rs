//! Per-interaction-type transformation rules.
//!
//! Each interaction type supplies two independent, pure mappings: a
//! `to_qti` function (PIE model to QTI markup plus a matching
//! `responseDeclaration`) and an extractor implementing
//! [`ElementExtractor`](crate::extract::ElementExtractor) for the reverse
//! direction. Structurally aligned mappings (choice, text entry, slider,
//! match, hotspot, EBSR) are full fidelity; the associate-to-categorize
//! mapping is best effort and flags itself as such.

pub mod categorize;
pub mod choice;
pub mod ebsr;
pub mod hotspot;
pub mod match_interaction;
pub mod metadata;
pub mod slider;
pub mod text_entry;

use crate::error::{InteropError, Result};
use crate::extract::ExtractionRegistry;
use crate::model::{elements, PieModel};
use crate::xml::escape_xml;

/// Generated QTI markup for one interaction: the interaction element itself
/// plus the `responseDeclaration` block that must precede the item body.
#[derive(Debug, Clone)]
pub struct QtiFragment {
    pub response_declaration: String,
    pub body: String,
}

/// Build a `responseDeclaration` with encoded correct-response values.
pub(crate) fn response_declaration(
    identifier: &str,
    cardinality: &str,
    base_type: &str,
    values: &[String],
) -> String {
    let mut out = format!(
        r#"<responseDeclaration identifier="{}" cardinality="{}" baseType="{}">"#,
        escape_xml(identifier),
        cardinality,
        base_type
    );
    if !values.is_empty() {
        out.push_str("<correctResponse>");
        for value in values {
            out.push_str(&format!("<value>{}</value>", escape_xml(value)));
        }
        out.push_str("</correctResponse>");
    }
    out.push_str("</responseDeclaration>");
    out
}

/// Correct-response values declared for an identifier, in document order.
pub(crate) fn declared_correct_values(
    ctx: &crate::extract::ExtractionContext<'_, '_>,
    identifier: &str,
) -> Vec<String> {
    use crate::xml::{find_child, find_children, inner_text};

    let Some(declaration) = ctx.declaration(identifier) else {
        return Vec::new();
    };
    let Some(correct) = find_child(declaration, "correctResponse") else {
        return Vec::new();
    };
    find_children(correct, "value").map(inner_text).collect()
}

/// Map a PIE model to its QTI fragment by element id.
///
/// # Errors
/// [`InteropError::UnsupportedInteraction`] for elements without a built-in
/// transformer, plus whatever the individual transformer raises.
pub fn interaction_to_qti(model: &PieModel, item_id: &str) -> Result<QtiFragment> {
    match model.element.as_str() {
        elements::MULTIPLE_CHOICE => choice::to_qti(model, item_id),
        elements::TEXT_ENTRY => text_entry::to_qti(model, item_id),
        elements::SLIDER => slider::to_qti(model, item_id),
        elements::MATCH => match_interaction::to_qti(model, item_id),
        elements::HOTSPOT => hotspot::to_qti(model, item_id),
        elements::EBSR => ebsr::to_qti(model, item_id),
        elements::CATEGORIZE => categorize::to_qti(model, item_id),
        other => Err(InteropError::UnsupportedInteraction {
            item_id: item_id.to_string(),
            element: other.to_string(),
        }),
    }
}

/// Extraction registry holding the built-in QTI-to-PIE rules.
///
/// The EBSR extractor registers for `choiceInteraction` at a high priority
/// with a narrow predicate, shadowing the broad low-priority choice rule
/// when an item body holds two or more choice interactions.
#[must_use]
pub fn default_extraction_registry() -> ExtractionRegistry<PieModel> {
    let mut registry = ExtractionRegistry::new();
    // Built-in registrations cannot collide; ignore the impossible error
    // rather than propagating registry setup through every caller.
    let results = [
        registry.register(choice::ChoiceExtractor),
        registry.register(ebsr::EbsrExtractor),
        registry.register(text_entry::TextEntryExtractor),
        registry.register(slider::SliderExtractor),
        registry.register(match_interaction::MatchExtractor),
        registry.register(hotspot::HotspotExtractor),
        registry.register(categorize::CategorizeExtractor),
    ];
    for result in results {
        if let Err(err) = result {
            tracing::error!(error = %err, "built-in extractor failed to register");
        }
    }
    registry
}
