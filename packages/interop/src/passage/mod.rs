//! Shared passage (stimulus) handling.
//!
//! Passages reach the engine three ways: as passage models inline in the
//! item's model sequence, as a full stimulus object attached to the item, or
//! as a bare foreign-key id that must be resolved through a caller-supplied
//! [`PassageResolver`]. On the QTI side a passage is either embedded in the
//! item body (inline strategy) or referenced as a side file under
//! `passages/` (external strategy, the IMS content-package layout).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{passage_file_path, QTI_NAMESPACE};
use crate::error::{InteropError, Result};
use crate::model::{
    elements, PassageFile, PassageRef, PassageSection, PassageStimulus, PassageStrategy, PieItem,
    PieModel,
};
use crate::xml::escape_xml;

/// Resolves a bare passage id to its full content.
///
/// Implemented by the host application; the engine never reaches into a
/// datastore itself.
#[async_trait]
pub trait PassageResolver: Send + Sync {
    async fn resolve(&self, passage_id: &str) -> Result<ResolvedPassage>;
}

/// A passage as returned by a [`PassageResolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPassage {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// HTML markup of the passage body.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// What the passage scan found on an item.
#[derive(Debug, Clone)]
pub struct PassageDetection {
    pub inline_models: Vec<PieModel>,
    pub external: Option<PassageRef>,
    pub recommended_strategy: PassageStrategy,
}

impl PassageDetection {
    #[must_use]
    pub fn has_passages(&self) -> bool {
        self.external.is_some() || !self.inline_models.is_empty()
    }
}

/// Scan an item for passage content and recommend an embedding strategy.
///
/// # Errors
/// [`InteropError::ConflictingPassages`] when the item carries both inline
/// passage models and an external passage attachment.
pub fn detect_passages(item: &PieItem) -> Result<PassageDetection> {
    // A passage model with an empty passages array carries no content and
    // does not count as an inline passage.
    let inline_models: Vec<PieModel> = item
        .passage_models()
        .into_iter()
        .filter(|model| {
            model
                .payload
                .get("passages")
                .and_then(Value::as_array)
                .is_some_and(|sections| !sections.is_empty())
        })
        .cloned()
        .collect();

    if item.passage.is_some() && !inline_models.is_empty() {
        return Err(InteropError::ConflictingPassages {
            item_id: item.id.clone(),
        });
    }

    let recommended_strategy = if item.passage.is_some() {
        PassageStrategy::External
    } else {
        PassageStrategy::Inline
    };

    Ok(PassageDetection {
        inline_models,
        external: item.passage.clone(),
        recommended_strategy,
    })
}

/// Whether the item needs a resolver round-trip before it can be rendered.
#[must_use]
pub fn needs_passage_resolution(item: &PieItem) -> bool {
    matches!(item.passage, Some(PassageRef::Id(_)))
}

/// Passage markup ready for assembly into an item body.
#[derive(Debug, Clone, Default)]
pub struct RenderedPassages {
    /// Markup to prepend to the item body.
    pub markup: String,
    /// Side files, present only under the external strategy.
    pub files: Vec<PassageFile>,
}

/// A passage normalized from any of its three source shapes.
#[derive(Debug, Clone)]
struct PassageUnit {
    id: String,
    title: String,
    content: String,
    metadata: Option<Value>,
}

/// Render the detected passages with the given strategy.
///
/// # Errors
/// [`InteropError::MissingPassageResolver`] when an id-only passage is
/// present and no resolver was supplied; resolver errors pass through.
pub async fn render_passages(
    item: &PieItem,
    detection: &PassageDetection,
    strategy: PassageStrategy,
    resolver: Option<&dyn PassageResolver>,
) -> Result<RenderedPassages> {
    let mut units = Vec::new();

    match &detection.external {
        Some(PassageRef::Id(passage_id)) => {
            let resolver = resolver.ok_or_else(|| InteropError::MissingPassageResolver {
                item_id: item.id.clone(),
                passage_id: passage_id.clone(),
            })?;
            let resolved = resolver.resolve(passage_id).await?;
            tracing::debug!(item_id = %item.id, passage_id = %resolved.id, "resolved passage");
            units.push(PassageUnit {
                id: resolved.id,
                title: resolved.title,
                content: resolved.content,
                metadata: resolved.metadata,
            });
        }
        Some(PassageRef::Stimulus(stimulus)) => units.push(stimulus_unit(stimulus)),
        None => {}
    }

    for model in &detection.inline_models {
        units.push(model_unit(model, &item.id)?);
    }

    let mut rendered = RenderedPassages::default();
    for unit in units {
        match strategy {
            PassageStrategy::Inline => {
                rendered.markup.push_str(&format!(
                    r#"<div class="stimulus" data-pie-passage-id="{}">{}</div>"#,
                    escape_xml(&unit.id),
                    unit.content
                ));
            }
            PassageStrategy::External => {
                let file_path = passage_file_path(&unit.id);
                rendered.markup.push_str(&format!(
                    r#"<object type="text/html" data="{}" data-pie-passage-id="{}">{}</object>"#,
                    escape_xml(&file_path),
                    escape_xml(&unit.id),
                    escape_xml(&unit.title)
                ));
                rendered.files.push(PassageFile {
                    id: unit.id.clone(),
                    file_path,
                    xml: stimulus_xml(&unit),
                    metadata: unit.metadata,
                });
            }
        }
    }
    Ok(rendered)
}

fn stimulus_unit(stimulus: &PassageStimulus) -> PassageUnit {
    let mut title = String::new();
    let mut content = String::new();
    for model in &stimulus.config.models {
        for section in &model.passages {
            if title.is_empty() {
                title = section.title.clone();
            }
            push_section(&mut content, section);
        }
    }
    PassageUnit {
        id: stimulus.id.clone(),
        title,
        content,
        metadata: stimulus
            .search_meta_data
            .clone()
            .map(Value::Object),
    }
}

fn model_unit(model: &PieModel, item_id: &str) -> Result<PassageUnit> {
    let sections: Vec<PassageSection> = model
        .payload
        .get("passages")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| InteropError::InvalidModel {
            item_id: item_id.to_string(),
            element: elements::PASSAGE.to_string(),
            reason: e.to_string(),
        })?
        .unwrap_or_default();

    let mut content = String::new();
    for section in &sections {
        push_section(&mut content, section);
    }
    Ok(PassageUnit {
        id: model.id.clone(),
        title: sections.first().map(|s| s.title.clone()).unwrap_or_default(),
        content,
        metadata: None,
    })
}

fn push_section(out: &mut String, section: &PassageSection) {
    if !section.title.is_empty() {
        out.push_str(&format!("<h3>{}</h3>", escape_xml(&section.title)));
    }
    out.push_str(&section.text);
}

/// Standalone stimulus document written to `passages/<id>.xml`.
fn stimulus_xml(unit: &PassageUnit) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<assessmentStimulus xmlns="{ns}" identifier="{id}" title="{title}">"#,
            "<stimulusBody>{content}</stimulusBody></assessmentStimulus>"
        ),
        ns = QTI_NAMESPACE,
        id = escape_xml(&unit.id),
        title = escape_xml(&unit.title),
        content = unit.content
    )
}
