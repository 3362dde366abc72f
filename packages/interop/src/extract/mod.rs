//! Typed extraction of QTI elements.
//!
//! An [`ElementExtractor`] is a rule that recognizes one XML interaction
//! shape and parses it into a typed structure. Extractors are held in an
//! [`ExtractionRegistry`] and dispatched by element type and priority, which
//! lets specialized plugin rules shadow the broad built-in rules without
//! modifying them.

mod registry;

pub use registry::ExtractionRegistry;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use roxmltree::Node;

use crate::error::Result;
use crate::model::TransformOptions;

/// Context for one extraction call. Immutable from the extractor's point of
/// view; the dispatch cache uses interior mutability and lives only for the
/// duration of the enclosing transform call.
pub struct ExtractionContext<'a, 'input> {
    /// Id of the item being transformed, for error messages.
    pub item_id: String,
    /// `responseDeclaration` elements of the current item, keyed by identifier.
    pub response_declarations: HashMap<String, Node<'a, 'input>>,
    /// Caller configuration.
    pub options: &'a TransformOptions,
    /// Side-table mapping node ids to winning extractor ids.
    cache: RefCell<HashMap<roxmltree::NodeId, String>>,
}

impl<'a, 'input> ExtractionContext<'a, 'input> {
    /// Create a context with no response declarations.
    #[must_use]
    pub fn new(item_id: impl Into<String>, options: &'a TransformOptions) -> Self {
        Self {
            item_id: item_id.into(),
            response_declarations: HashMap::new(),
            options,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Attach the item's response declarations.
    #[must_use]
    pub fn with_declarations(
        mut self,
        declarations: HashMap<String, Node<'a, 'input>>,
    ) -> Self {
        self.response_declarations = declarations;
        self
    }

    /// Look up a response declaration by identifier.
    #[must_use]
    pub fn declaration(&self, identifier: &str) -> Option<Node<'a, 'input>> {
        self.response_declarations.get(identifier).copied()
    }

    pub(crate) fn cached_extractor(&self, node_key: roxmltree::NodeId) -> Option<String> {
        self.cache.borrow().get(&node_key).cloned()
    }

    pub(crate) fn cache_extractor(&self, node_key: roxmltree::NodeId, extractor_id: &str) {
        self.cache
            .borrow_mut()
            .insert(node_key, extractor_id.to_string());
    }
}

impl fmt::Debug for ExtractionContext<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionContext")
            .field("item_id", &self.item_id)
            .field(
                "response_declarations",
                &self.response_declarations.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Outcome of an optional post-extraction validation pass.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    /// A passing validation with no findings.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A passing validation that carries warnings.
    #[must_use]
    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings,
        }
    }

    /// A failing validation.
    #[must_use]
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// A rule recognizing and parsing one XML element shape into `T`.
pub trait ElementExtractor<T>: Send + Sync {
    /// Unique id, registry-wide.
    fn id(&self) -> &str;

    /// Human-readable name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Higher priority is tried first within an element-type bucket.
    fn priority(&self) -> i32;

    /// Element tag names this extractor is registered for. Must be non-empty.
    fn element_types(&self) -> &[&str];

    /// Check whether this extractor handles the given element.
    ///
    /// An `Err` is logged by the registry and treated as `false`; the scan
    /// continues with the next extractor.
    fn can_handle(&self, element: Node<'_, '_>, ctx: &ExtractionContext<'_, '_>) -> Result<bool>;

    /// Parse the element into a typed structure.
    fn extract(&self, element: Node<'_, '_>, ctx: &ExtractionContext<'_, '_>) -> Result<T>;

    /// Validate extracted data. A failing validation becomes a failure
    /// outcome; warnings attach to an otherwise successful one.
    fn validate(&self, _data: &T) -> Validation {
        Validation::valid()
    }
}

/// Typed failure produced by the extraction registry.
#[derive(Debug, Clone)]
pub struct ExtractionError {
    pub message: String,
    /// Id of the extractor that failed, when one was selected.
    pub extractor_id: Option<String>,
    /// Tag name of the element under extraction.
    pub element_type: String,
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extractor_id {
            Some(id) => write!(f, "[{}] <{}>: {}", id, self.element_type, self.message),
            None => write!(f, "<{}>: {}", self.element_type, self.message),
        }
    }
}

/// Result of one registry extraction.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome<T> {
    Success { data: T, warnings: Vec<String> },
    Failure { error: ExtractionError },
}

impl<T> ExtractionOutcome<T> {
    /// Whether the extraction succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The extracted data, when successful.
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// The failure, when unsuccessful.
    #[must_use]
    pub fn error(&self) -> Option<&ExtractionError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}
