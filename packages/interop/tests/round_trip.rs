//! Round-trip and dispatch behavior across the two directions.

use pie_interop::engine::{InteropEngine, TransformContext};
use pie_interop::error::Result;
use pie_interop::extract::{ElementExtractor, ExtractionContext};
use pie_interop::model::{elements, ContentInput, FormatId, PieItem, PieModel, TransformInput};
use pretty_assertions::assert_eq;
use serde_json::json;

fn five_choice_item() -> PieItem {
    serde_json::from_value(json!({
        "id": "science-1",
        "config": {"models": [{
            "id": "1",
            "element": "@pie-element/multiple-choice",
            "prompt": "Which of these is a noble gas?",
            "choices": [
                {"value": "a", "label": "Helium", "correct": true},
                {"value": "b", "label": "Oxygen", "correct": false},
                {"value": "c", "label": "Nitrogen", "correct": false},
                {"value": "d", "label": "Hydrogen", "correct": false},
                {"value": "e", "label": "Chlorine", "correct": false}
            ],
            "choiceMode": "radio",
            "shuffle": false
        }]},
        "searchMetaData": {"subject": "Science", "tags": [], "difficulty": 0}
    }))
    .unwrap()
}

fn parse_pie_output(result: &pie_interop::TransformResult) -> PieItem {
    serde_json::from_str(&result.items[0].content).unwrap()
}

#[tokio::test]
async fn choice_item_round_trips_with_exact_metadata() {
    let engine = InteropEngine::new();
    let ctx = TransformContext::new();
    let original = five_choice_item();

    let qti = engine.pie_to_qti(&original, &ctx).await.unwrap();
    assert_eq!(qti.items[0].format, FormatId::Qti22);
    assert_eq!(qti.metadata.fidelity.as_deref(), Some("full"));

    let back = engine.qti_to_pie(&qti.items[0].content, &ctx).unwrap();
    let recovered = parse_pie_output(&back);

    assert_eq!(recovered.id, original.id);
    // Scorable fields survive exactly.
    let recovered_model = recovered.interaction_models()[0];
    let original_model = original.interaction_models()[0];
    assert_eq!(
        recovered_model.payload.get("choices"),
        original_model.payload.get("choices")
    );
    assert_eq!(
        recovered_model.payload.get("prompt"),
        original_model.payload.get("prompt")
    );
    // Metadata recovers verbatim, empty array and zero included.
    let meta = recovered.search_meta_data.unwrap();
    assert_eq!(meta.get("subject"), Some(&json!("Science")));
    assert_eq!(meta.get("tags"), Some(&json!([])));
    assert_eq!(meta.get("difficulty"), Some(&json!(0)));
}

#[tokio::test]
async fn ebsr_shadows_plain_choice_when_two_interactions_exist() {
    let engine = InteropEngine::new();
    let ctx = TransformContext::new();

    let ebsr_item: PieItem = serde_json::from_value(json!({
        "id": "ebsr-1",
        "config": {"models": [{
            "id": "1",
            "element": "@pie-element/ebsr",
            "partA": {
                "prompt": "What is the central idea?",
                "choices": [
                    {"value": "a", "label": "Growth", "correct": true},
                    {"value": "b", "label": "Decay", "correct": false}
                ],
                "choiceMode": "radio",
                "shuffle": false
            },
            "partB": {
                "prompt": "Which sentence supports it?",
                "choices": [
                    {"value": "a", "label": "Paragraph 1", "correct": false},
                    {"value": "b", "label": "Paragraph 2", "correct": true}
                ],
                "choiceMode": "radio",
                "shuffle": false
            }
        }]}
    }))
    .unwrap();

    let qti = engine.pie_to_qti(&ebsr_item, &ctx).await.unwrap();
    let xml = &qti.items[0].content;
    assert_eq!(xml.matches("<choiceInteraction").count(), 2);
    assert!(xml.contains("RESPONSE-A"));
    assert!(xml.contains("RESPONSE-B"));

    // Coming back, the high-priority EBSR rule wins over the plain choice
    // rule even though both are registered for choiceInteraction.
    let back = engine.qti_to_pie(xml, &ctx).unwrap();
    let recovered = parse_pie_output(&back);
    let model = recovered.interaction_models()[0];
    assert_eq!(model.element, elements::EBSR);
    assert_eq!(
        model.payload.get("partA"),
        ebsr_item.config.models[0].payload.get("partA")
    );
    assert_eq!(
        model.payload.get("partB"),
        ebsr_item.config.models[0].payload.get("partB")
    );
}

#[tokio::test]
async fn single_choice_interaction_still_uses_the_broad_rule() {
    let engine = InteropEngine::new();
    let ctx = TransformContext::new();

    let qti = engine
        .pie_to_qti(&five_choice_item(), &ctx)
        .await
        .unwrap();
    let back = engine.qti_to_pie(&qti.items[0].content, &ctx).unwrap();
    let recovered = parse_pie_output(&back);
    assert_eq!(
        recovered.interaction_models()[0].element,
        elements::MULTIPLE_CHOICE
    );
}

/// A plugin rule that claims choice interactions whose first choice carries
/// a `likert` class, at a priority far above the built-ins.
struct LikertExtractor;

impl ElementExtractor<PieModel> for LikertExtractor {
    fn id(&self) -> &str {
        "test-likert"
    }

    fn priority(&self) -> i32 {
        500
    }

    fn element_types(&self) -> &[&str] {
        &["choiceInteraction"]
    }

    fn can_handle(
        &self,
        element: roxmltree::Node<'_, '_>,
        _ctx: &ExtractionContext<'_, '_>,
    ) -> Result<bool> {
        Ok(element
            .descendants()
            .any(|n| n.attribute("class") == Some("likert")))
    }

    fn extract(
        &self,
        _element: roxmltree::Node<'_, '_>,
        _ctx: &ExtractionContext<'_, '_>,
    ) -> Result<PieModel> {
        PieModel::from_payload("1", "@test/likert", &json!({"scale": 5}))
    }
}

#[tokio::test]
async fn plugin_rule_shadows_builtin_only_where_its_predicate_matches() {
    let mut engine = InteropEngine::new();
    engine.extractors_mut().register(LikertExtractor).unwrap();
    let ctx = TransformContext::new();

    let likert_xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <assessmentItem xmlns="http://www.imsglobal.org/xsd/imsqti_v2p2" identifier="likert-1">
            <responseDeclaration identifier="RESPONSE" cardinality="single" baseType="identifier"/>
            <itemBody>
                <choiceInteraction responseIdentifier="RESPONSE" maxChoices="1">
                    <simpleChoice identifier="a" class="likert">Strongly agree</simpleChoice>
                </choiceInteraction>
            </itemBody>
        </assessmentItem>"#;
    let back = engine.qti_to_pie(likert_xml, &ctx).unwrap();
    let recovered = parse_pie_output(&back);
    assert_eq!(recovered.interaction_models()[0].element, "@test/likert");

    // An ordinary item is untouched by the plugin rule.
    let qti = engine
        .pie_to_qti(&five_choice_item(), &ctx)
        .await
        .unwrap();
    let back = engine.qti_to_pie(&qti.items[0].content, &ctx).unwrap();
    let recovered = parse_pie_output(&back);
    assert_eq!(
        recovered.interaction_models()[0].element,
        elements::MULTIPLE_CHOICE
    );
}

#[tokio::test]
async fn categorize_is_flagged_best_effort() {
    let engine = InteropEngine::new();
    let ctx = TransformContext::new();

    let item: PieItem = serde_json::from_value(json!({
        "id": "cat-1",
        "config": {"models": [{
            "id": "1",
            "element": "@pie-element/categorize",
            "categories": [{"id": "fruit", "label": "Fruit"}],
            "choices": [
                {"id": "apple", "label": "Apple"},
                {"id": "carrot", "label": "Carrot"}
            ],
            "correctResponse": [{"category": "fruit", "choices": ["apple"]}]
        }]}
    }))
    .unwrap();

    let qti = engine.pie_to_qti(&item, &ctx).await.unwrap();
    assert_eq!(qti.metadata.fidelity.as_deref(), Some("best-effort"));

    let back = engine.qti_to_pie(&qti.items[0].content, &ctx).unwrap();
    assert_eq!(back.metadata.fidelity.as_deref(), Some("best-effort"));
    assert!(!back.metadata.warnings.is_empty());
    let recovered = parse_pie_output(&back);
    assert_eq!(
        recovered.interaction_models()[0].element,
        elements::CATEGORIZE
    );
}

#[tokio::test]
async fn text_entry_and_slider_round_trip_through_the_engine() {
    let engine = InteropEngine::new();
    let ctx = TransformContext::new();

    let text_entry: PieItem = serde_json::from_value(json!({
        "id": "te-1",
        "config": {"models": [{
            "id": "1",
            "element": "@pie-element/text-entry",
            "correctResponses": ["Pacific", "Pacific Ocean"],
            "expectedLength": 20
        }]}
    }))
    .unwrap();
    let qti = engine.pie_to_qti(&text_entry, &ctx).await.unwrap();
    let back = engine.qti_to_pie(&qti.items[0].content, &ctx).unwrap();
    let model = parse_pie_output(&back);
    let model = model.interaction_models()[0].clone();
    assert_eq!(model.element, elements::TEXT_ENTRY);
    assert_eq!(
        model.payload.get("correctResponses"),
        Some(&json!(["Pacific", "Pacific Ocean"]))
    );

    let slider: PieItem = serde_json::from_value(json!({
        "id": "sl-1",
        "config": {"models": [{
            "id": "1",
            "element": "@pie-element/slider",
            "min": 0.0,
            "max": 10.0,
            "step": 0.5,
            "correct": 7.5
        }]}
    }))
    .unwrap();
    let qti = engine.pie_to_qti(&slider, &ctx).await.unwrap();
    let back = engine.qti_to_pie(&qti.items[0].content, &ctx).unwrap();
    let model = parse_pie_output(&back);
    let model = model.interaction_models()[0].clone();
    assert_eq!(model.element, elements::SLIDER);
    assert_eq!(model.payload.get("correct"), Some(&json!(7.5)));
}

#[tokio::test]
async fn format_detection_routes_both_directions() {
    let engine = InteropEngine::new();
    let ctx = TransformContext::new();

    let pie_input = TransformInput {
        content: ContentInput::Json(serde_json::to_value(five_choice_item()).unwrap()),
        format: None,
    };
    let result = engine.transform(&pie_input, &ctx).await.unwrap();
    assert_eq!(result.items[0].format, FormatId::Qti22);

    let qti_input = TransformInput {
        content: ContentInput::Text(result.items[0].content.clone()),
        format: None,
    };
    let result = engine.transform(&qti_input, &ctx).await.unwrap();
    assert_eq!(result.items[0].format, FormatId::Pie);
}
