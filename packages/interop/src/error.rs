//! Error types for the interop engine.
//!
//! Two deliberate channels exist. Variants of [`InteropError`] are raised for
//! item-transform preconditions that reflect a malformed input document; they
//! abort only the current item and are caught at the batch boundary. Expected,
//! data-dependent outcomes (no format detected, extraction failure, manifest
//! validation failure) travel as result-typed values instead and never use
//! this enum.

use thiserror::Error;

/// Main error type for the interop library.
#[derive(Debug, Error)]
pub enum InteropError {
    /// Required container element is absent from the QTI document.
    #[error("Missing required element <{element}> in item '{item_id}'. The document must contain an <{element}> block")]
    MissingElement { element: String, item_id: String },

    /// No recognized interaction element was found.
    #[error("No supported interaction found in item '{item_id}'. Expected one of: {expected}")]
    MissingInteraction { item_id: String, expected: String },

    /// A cardinality constraint on element counts is unmet.
    #[error("Item '{item_id}' needs at least {expected} <{element}> elements but has {found}. Add the missing elements or use a different interaction type")]
    InsufficientElements {
        item_id: String,
        element: String,
        expected: usize,
        found: usize,
    },

    /// An image-based interaction lacks resolvable width/height.
    #[error("Item '{item_id}' has no resolvable width/height for image '{image}'. Coordinate scoring requires explicit dimensions")]
    MissingDimensions { item_id: String, image: String },

    /// An external passage reference needs resolution but no resolver was configured.
    #[error("Item '{item_id}' references external passage '{passage_id}' but no passageResolver was provided. Configure a resolver on the transform context")]
    MissingPassageResolver { item_id: String, passage_id: String },

    /// An item declares both inline and external passages.
    #[error("Item '{item_id}' declares both an inline passage model and an external passage reference. Remove one of them")]
    ConflictingPassages { item_id: String },

    /// A PIE model names an element no transformer is registered for.
    #[error("Item '{item_id}' uses unsupported element '{element}'")]
    UnsupportedInteraction { item_id: String, element: String },

    /// A PIE model payload does not match the expected shape for its element.
    #[error("Invalid model for element '{element}' in item '{item_id}': {reason}")]
    InvalidModel {
        item_id: String,
        element: String,
        reason: String,
    },

    /// Extraction registry produced a failure for the current item.
    #[error("Extraction failed for item '{item_id}': {message}")]
    Extraction { item_id: String, message: String },

    /// A registry registration precondition was violated.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Input could not be classified as any registered format.
    #[error("Could not detect format of input{}", .hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    UnknownFormat { hint: Option<String> },

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// JSON (de)serialization failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for interop operations.
pub type Result<T> = std::result::Result<T, InteropError>;
