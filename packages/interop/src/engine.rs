//! Transformation engine: format routing plus item assembly/parsing.
//!
//! The engine owns the two registries (format detectors and element
//! extractors) and exposes the top-level operations. Hosts construct one
//! engine value, customize the registries if needed, and pass it by
//! reference to every call; there is no process-global state.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{PIE_EXTENSION_NAMESPACE, QTI_NAMESPACE};
use crate::detect::FormatDetectorRegistry;
use crate::error::{InteropError, Result};
use crate::extract::{ExtractionContext, ExtractionOutcome, ExtractionRegistry};
use crate::model::{
    elements, FormatId, ItemOutput, PassageRef, PieConfig, PieItem, PieModel, TransformInput,
    TransformMetadata, TransformOptions, TransformResult,
};
use crate::passage::{self, PassageResolver};
use crate::transform::{self, metadata};
use crate::xml::{
    attr, attr_or, escape_xml, find_child, find_children, has_class, inner_xml, tag_name,
};

/// Per-call configuration: transform options plus an optional passage
/// resolver supplied by the host.
#[derive(Default, Clone)]
pub struct TransformContext {
    pub options: TransformOptions,
    pub resolver: Option<Arc<dyn PassageResolver>>,
}

impl TransformContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PassageResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl std::fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformContext")
            .field("options", &self.options)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// The bidirectional QTI <-> PIE transformation engine.
pub struct InteropEngine {
    detectors: FormatDetectorRegistry,
    extractors: ExtractionRegistry<PieModel>,
}

impl InteropEngine {
    /// Engine with the built-in detectors and extraction rules.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: FormatDetectorRegistry::with_defaults(),
            extractors: transform::default_extraction_registry(),
        }
    }

    /// Engine with empty registries, for hosts that register everything
    /// themselves.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            detectors: FormatDetectorRegistry::new(),
            extractors: ExtractionRegistry::new(),
        }
    }

    pub fn detectors_mut(&mut self) -> &mut FormatDetectorRegistry {
        &mut self.detectors
    }

    pub fn extractors_mut(&mut self) -> &mut ExtractionRegistry<PieModel> {
        &mut self.extractors
    }

    /// Route one input to the right direction, detecting the format when the
    /// caller did not name one.
    ///
    /// # Errors
    /// [`InteropError::UnknownFormat`] when no detector claims the input;
    /// otherwise whatever the directional transform raises.
    pub async fn transform(
        &self,
        input: &TransformInput,
        ctx: &TransformContext,
    ) -> Result<TransformResult> {
        let format = match input.format {
            Some(format) => format,
            None => self
                .detectors
                .detect_format(&input.content)
                .await
                .ok_or(InteropError::UnknownFormat { hint: None })?,
        };
        tracing::debug!(format = %format, "transforming input");

        match format {
            FormatId::Qti22 => {
                let xml = input.content.as_text().ok_or(InteropError::UnknownFormat {
                    hint: Some("QTI input must be an XML string".to_string()),
                })?;
                self.qti_to_pie(xml, ctx)
            }
            FormatId::Pie => {
                let value = input.content.to_json().ok_or(InteropError::UnknownFormat {
                    hint: Some("PIE input must be valid JSON".to_string()),
                })?;
                let item: PieItem = serde_json::from_value(value)?;
                self.pie_to_qti(&item, ctx).await
            }
        }
    }

    /// Transform a batch of inputs with per-item isolation: one failing item
    /// yields an `Err` in its slot and never aborts the rest.
    pub async fn transform_batch(
        &self,
        inputs: &[TransformInput],
        ctx: &TransformContext,
    ) -> Vec<Result<TransformResult>> {
        let mut results = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let result = self.transform(input, ctx).await;
            if let Err(err) = &result {
                tracing::warn!(index, error = %err, "batch item failed");
            }
            results.push(result);
        }
        results
    }

    /// PIE item JSON to a QTI 2.2 `assessmentItem` document.
    ///
    /// Only the first interaction model is transformed; additional models
    /// are reported through `metadata.model_count` and a warning.
    pub async fn pie_to_qti(
        &self,
        item: &PieItem,
        ctx: &TransformContext,
    ) -> Result<TransformResult> {
        let mut warnings = Vec::new();

        let interactions = item.interaction_models();
        let first = interactions
            .first()
            .ok_or_else(|| InteropError::MissingInteraction {
                item_id: item.id.clone(),
                expected: "at least one non-passage model in config.models".to_string(),
            })?;
        if interactions.len() > 1 {
            warnings.push(format!(
                "item has {} interaction models; only the first ('{}') was transformed",
                interactions.len(),
                first.id
            ));
        }

        let fragment = transform::interaction_to_qti(first, &item.id)?;

        let detection = passage::detect_passages(item)?;
        let strategy = ctx
            .options
            .passage_strategy
            .unwrap_or(detection.recommended_strategy);
        let rendered = if detection.has_passages() {
            passage::render_passages(item, &detection, strategy, ctx.resolver.as_deref()).await?
        } else {
            passage::RenderedPassages::default()
        };

        let metadata_xml = item
            .search_meta_data
            .as_ref()
            .map(metadata::metadata_to_xml)
            .unwrap_or_default();

        // Fixed body assembly order: metadata, then passages, then the
        // interaction markup.
        let xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "\n",
                r#"<assessmentItem xmlns="{qti}" xmlns:pie="{pie}" identifier="{id}" "#,
                r#"title="{title}" adaptive="false" timeDependent="false">"#,
                "{declarations}<itemBody>{metadata}{passages}{body}</itemBody>",
                "</assessmentItem>"
            ),
            qti = QTI_NAMESPACE,
            pie = PIE_EXTENSION_NAMESPACE,
            id = escape_xml(&item.id),
            title = escape_xml(&item.id),
            declarations = fragment.response_declaration,
            metadata = metadata_xml,
            passages = rendered.markup,
            body = fragment.body,
        );

        Ok(TransformResult {
            items: vec![ItemOutput {
                id: item.id.clone(),
                content: xml,
                format: FormatId::Qti22,
            }],
            metadata: TransformMetadata {
                model_count: interactions.len(),
                passage_strategy: detection.has_passages().then_some(strategy),
                external_passage_count: (!rendered.files.is_empty())
                    .then_some(rendered.files.len()),
                fidelity: Some(fidelity_for(&first.element).to_string()),
                warnings,
            },
            passage_files: rendered.files,
        })
    }

    /// QTI 2.2 item XML to a PIE item.
    pub fn qti_to_pie(&self, xml: &str, ctx: &TransformContext) -> Result<TransformResult> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        let item_id = attr_or(root, "identifier", "item").to_string();

        let mut declarations = std::collections::HashMap::new();
        for declaration in find_children(root, "responseDeclaration") {
            if let Some(identifier) = attr(declaration, "identifier") {
                declarations.insert(identifier.to_string(), declaration);
            }
        }

        let body = find_child(root, "itemBody").ok_or_else(|| InteropError::MissingElement {
            element: "itemBody".to_string(),
            item_id: item_id.clone(),
        })?;

        let extraction_ctx =
            ExtractionContext::new(item_id.clone(), &ctx.options).with_declarations(declarations);

        let interaction = body
            .descendants()
            .find(|node| node.is_element() && self.extractors.has_type(tag_name(*node)))
            .ok_or_else(|| InteropError::MissingInteraction {
                item_id: item_id.clone(),
                expected: self.extractors.known_types().join(", "),
            })?;

        let mut warnings = Vec::new();
        let model = match self.extractors.extract(interaction, &extraction_ctx) {
            ExtractionOutcome::Success {
                data,
                warnings: extraction_warnings,
            } => {
                warnings.extend(extraction_warnings);
                data
            }
            ExtractionOutcome::Failure { error } => {
                return Err(InteropError::Extraction {
                    item_id,
                    message: error.to_string(),
                })
            }
        };

        let (passage_models, external_passage) = recover_passages(body);
        let fidelity = fidelity_for(&model.element).to_string();

        let mut models: Vec<PieModel> = passage_models;
        models.push(model);
        let element_map = models
            .iter()
            .map(|m| (element_tag(&m.element), m.element.clone()))
            .collect();

        let item = PieItem {
            id: item_id.clone(),
            uuid: None,
            passage: external_passage,
            config: PieConfig {
                id: None,
                models,
                elements: element_map,
            },
            search_meta_data: metadata::metadata_from_item(root),
            metadata: None,
        };

        Ok(TransformResult {
            items: vec![ItemOutput {
                id: item_id,
                content: serde_json::to_string_pretty(&item)?,
                format: FormatId::Pie,
            }],
            metadata: TransformMetadata {
                model_count: 1,
                passage_strategy: None,
                external_passage_count: None,
                fidelity: Some(fidelity),
                warnings,
            },
            passage_files: Vec::new(),
        })
    }
}

impl Default for InteropEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The associate-to-categorize mapping is the one lossy built-in.
fn fidelity_for(element: &str) -> &'static str {
    if element == elements::CATEGORIZE {
        "best-effort"
    } else {
        "full"
    }
}

/// Markup tag for a PIE element package: `@pie-element/multiple-choice`
/// renders as `<pie-multiple-choice>`.
fn element_tag(element: &str) -> String {
    let name = element.rsplit('/').next().unwrap_or(element);
    format!("pie-{name}")
}

/// Recover passages that an earlier PIE-to-QTI pass embedded in the body.
fn recover_passages(body: roxmltree::Node<'_, '_>) -> (Vec<PieModel>, Option<PassageRef>) {
    let mut inline_models = Vec::new();
    let mut external = None;

    for node in body.descendants().filter(roxmltree::Node::is_element) {
        let Some(passage_id) = attr(node, "data-pie-passage-id") else {
            continue;
        };
        match tag_name(node) {
            "div" if has_class(node, "stimulus") => {
                let Value::Object(payload) = serde_json::json!({
                    "passages": [{"title": "", "text": inner_xml(node)}]
                }) else {
                    continue;
                };
                inline_models.push(PieModel {
                    id: passage_id.to_string(),
                    element: elements::PASSAGE.to_string(),
                    payload,
                });
            }
            "object" => {
                external = Some(PassageRef::Id(passage_id.to_string()));
            }
            _ => {}
        }
    }
    (inline_models, external)
}
