//! Core data types for the interop engine.
//!
//! The PIE side of the engine is JSON. Model payloads are deliberately
//! open-ended: everything beyond `id` and `element` is carried in a flattened
//! map so third-party elements round-trip without the engine knowing their
//! shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InteropError, Result};

/// Well-known PIE element identifiers handled by the built-in transformers.
pub mod elements {
    pub const MULTIPLE_CHOICE: &str = "@pie-element/multiple-choice";
    pub const TEXT_ENTRY: &str = "@pie-element/text-entry";
    pub const SLIDER: &str = "@pie-element/slider";
    pub const MATCH: &str = "@pie-element/match";
    pub const HOTSPOT: &str = "@pie-element/hotspot";
    pub const EBSR: &str = "@pie-element/ebsr";
    pub const CATEGORIZE: &str = "@pie-element/categorize";
    pub const PASSAGE: &str = "@pie-element/passage";
}

/// Identifier of a recognized content format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatId {
    /// IMS QTI 2.2 XML.
    #[serde(rename = "qti22")]
    Qti22,
    /// PIE interactive-item JSON.
    #[serde(rename = "pie")]
    Pie,
}

impl FormatId {
    /// String form used in CLI arguments and result metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qti22 => "qti22",
            Self::Pie => "pie",
        }
    }

    /// Parse a format id from its string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qti22" => Some(Self::Qti22),
            "pie" => Some(Self::Pie),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input handed to format detection and transformation.
///
/// QTI arrives as text; PIE may arrive either as text or as an already
/// deserialized JSON value.
#[derive(Debug, Clone)]
pub enum ContentInput {
    Text(String),
    Json(Value),
}

impl ContentInput {
    /// The textual content, if this input is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(_) => None,
        }
    }

    /// The JSON value, parsing text on demand.
    #[must_use]
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Json(v) => Some(v.clone()),
            Self::Text(s) => serde_json::from_str(s).ok(),
        }
    }
}

/// A single PIE interaction (or passage) model.
///
/// `payload` holds every field other than `id` and `element`, preserved
/// verbatim through (de)serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieModel {
    pub id: String,
    pub element: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl PieModel {
    /// Deserialize the payload into a typed structure.
    ///
    /// # Errors
    /// Returns [`InteropError::InvalidModel`] when the payload does not match
    /// the expected shape for the model's element.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self, item_id: &str) -> Result<T> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            InteropError::InvalidModel {
                item_id: item_id.to_string(),
                element: self.element.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Build a model from a typed payload.
    ///
    /// # Errors
    /// Returns [`InteropError::Json`] if the payload does not serialize to a
    /// JSON object.
    pub fn from_payload<T: Serialize>(
        id: impl Into<String>,
        element: impl Into<String>,
        payload: &T,
    ) -> Result<Self> {
        let value = serde_json::to_value(payload)?;
        let Value::Object(payload) = value else {
            return Err(InteropError::Registry(
                "model payload must serialize to a JSON object".to_string(),
            ));
        };
        Ok(Self {
            id: id.into(),
            element: element.into(),
            payload,
        })
    }

    /// Whether this model is a passage model.
    #[must_use]
    pub fn is_passage(&self) -> bool {
        self.element == elements::PASSAGE
    }
}

/// One titled section of passage content. `text` is HTML markup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassageSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

/// The single model inside a passage stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageModel {
    pub id: String,
    pub element: String,
    #[serde(default)]
    pub passages: Vec<PassageSection>,
}

/// Config block of a passage stimulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageConfig {
    pub models: Vec<PassageModel>,
}

/// A full, self-contained passage payload. Used when the passage travels with
/// the item and no resolver round-trip is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageStimulus {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub config: PassageConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_meta_data: Option<Map<String, Value>>,
}

/// External passage attachment on an item: either a bare foreign-key id that
/// requires resolution, or a full stimulus object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PassageRef {
    Id(String),
    Stimulus(Box<PassageStimulus>),
}

/// Config block of a PIE item: the model sequence plus the element map
/// (tag name to package name) consumed by the rendering layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PieConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub models: Vec<PieModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub elements: BTreeMap<String, String>,
}

/// A PIE interactive item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<PassageRef>,
    pub config: PieConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_meta_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl PieItem {
    /// All interaction models (everything that is not a passage model).
    #[must_use]
    pub fn interaction_models(&self) -> Vec<&PieModel> {
        self.config.models.iter().filter(|m| !m.is_passage()).collect()
    }

    /// All passage models in the model sequence.
    #[must_use]
    pub fn passage_models(&self) -> Vec<&PieModel> {
        self.config.models.iter().filter(|m| m.is_passage()).collect()
    }
}

/// Embedding strategy for passage content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassageStrategy {
    /// Embed passage markup directly in the item body.
    Inline,
    /// Reference a side file under `passages/` via an `<object>` element.
    External,
}

impl PassageStrategy {
    /// String form used in result metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::External => "external",
        }
    }
}

/// Caller-supplied options for a transformation call.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Force a passage strategy instead of following the recommendation.
    pub passage_strategy: Option<PassageStrategy>,
}

/// Input to a transformation call.
#[derive(Debug, Clone)]
pub struct TransformInput {
    pub content: ContentInput,
    /// Known source format; when `None` the detector registry decides.
    pub format: Option<FormatId>,
}

/// One produced item document.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutput {
    pub id: String,
    pub content: String,
    pub format: FormatId,
}

/// A side-channel passage file produced under the external strategy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageFile {
    pub id: String,
    pub file_path: String,
    pub xml: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Metadata reported alongside every transformation result.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformMetadata {
    /// Total number of interaction models on the source item. Only the first
    /// is transformed; the rest are reported here, never silently dropped.
    pub model_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passage_strategy: Option<PassageStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_passage_count: Option<usize>,
    /// "full" for structurally aligned mappings, "best-effort" for lossy ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fidelity: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Result of a transformation call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub items: Vec<ItemOutput>,
    pub metadata: TransformMetadata,
    /// Present only under the external passage strategy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passage_files: Vec<PassageFile>,
}
