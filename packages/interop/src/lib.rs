//! Bidirectional transformation between IMS QTI 2.2 XML and PIE JSON
//! assessment items.
//!
//! The engine routes inputs through two registries: a
//! [`detect::FormatDetectorRegistry`] that classifies raw content, and an
//! [`extract::ExtractionRegistry`] that dispatches QTI interaction elements
//! to per-type extraction rules by priority. The PIE-to-QTI direction pairs
//! each built-in extractor with a `to_qti` rendering function in
//! [`transform`]. Shared passages resolve through a host-supplied async
//! [`passage::PassageResolver`], and [`manifest`] builds and validates the
//! IMS content-package manifest for transformed output.
//!
//! # Modules
//! - [`engine`] - top-level [`engine::InteropEngine`] with `transform`,
//!   `transform_batch`, `pie_to_qti` and `qti_to_pie`
//! - [`detect`] - priority-ordered format detection
//! - [`extract`] - element extraction trait, registry and dispatch cache
//! - [`transform`] - per-interaction transformation rules and metadata
//!   round-trip
//! - [`passage`] - passage detection, embedding strategies, resolver seam
//! - [`manifest`] - IMS content-package manifest generation and validation
//! - [`model`] - PIE data model and transform input/output types
//! - [`xml`] - element accessors over `roxmltree` and markup escaping
//! - [`error`] - error taxonomy
//! - [`config`] - namespaces, path templates and identifier validation
//!
//! # Example
//! ```no_run
//! use pie_interop::engine::{InteropEngine, TransformContext};
//! use pie_interop::model::{ContentInput, TransformInput};
//!
//! # async fn example() -> pie_interop::error::Result<()> {
//! let engine = InteropEngine::new();
//! let ctx = TransformContext::new();
//! let input = TransformInput {
//!     content: ContentInput::Text("<assessmentItem>...</assessmentItem>".to_string()),
//!     format: None,
//! };
//! let result = engine.transform(&input, &ctx).await?;
//! println!("{}", result.items[0].content);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod extract;
pub mod manifest;
pub mod model;
pub mod passage;
pub mod transform;
pub mod xml;

pub use engine::{InteropEngine, TransformContext};
pub use error::{InteropError, Result};
pub use model::{FormatId, PieItem, PieModel, TransformResult};
