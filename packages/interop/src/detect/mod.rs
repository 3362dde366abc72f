//! Format detection registry.
//!
//! Classifies raw input into a [`FormatId`] by scanning registered sniffers
//! in priority order. Detectors may be asynchronous; they are awaited
//! strictly sequentially so a slow low-priority detector can never overtake
//! a higher-priority one. A failing detector is logged and skipped, never
//! aborting the scan.

mod detectors;

pub use detectors::{PieFormatDetector, QtiFormatDetector};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ContentInput, FormatId};

/// A rule classifying raw input as belonging to a known format.
#[async_trait]
pub trait FormatDetector: Send + Sync {
    /// Unique id of this detector.
    fn id(&self) -> &str;

    /// The format this detector recognizes.
    fn format(&self) -> FormatId;

    /// Higher priority is evaluated first.
    fn priority(&self) -> i32;

    /// Check whether the input belongs to this detector's format.
    ///
    /// An `Err` is treated as a non-match by the registry.
    async fn detect(&self, input: &ContentInput) -> Result<bool>;
}

struct RegisteredDetector {
    /// Registration order, the explicit tie-break for equal priorities.
    seq: u64,
    detector: Arc<dyn FormatDetector>,
}

/// Registry of format detectors, scanned in priority order.
pub struct FormatDetectorRegistry {
    detectors: Vec<RegisteredDetector>,
    next_seq: u64,
}

impl FormatDetectorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detectors: Vec::new(),
            next_seq: 0,
        }
    }

    /// Create a registry with the built-in QTI and PIE detectors.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(QtiFormatDetector);
        registry.register(PieFormatDetector);
        registry
    }

    /// Register a detector.
    ///
    /// Detectors are re-sorted by priority descending after each
    /// registration; equal priorities keep registration order.
    pub fn register(&mut self, detector: impl FormatDetector + 'static) {
        self.register_arc(Arc::new(detector));
    }

    /// Register an already shared detector instance.
    pub fn register_arc(&mut self, detector: Arc<dyn FormatDetector>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.detectors.push(RegisteredDetector { seq, detector });
        self.detectors.sort_by(|a, b| {
            b.detector
                .priority()
                .cmp(&a.detector.priority())
                .then(a.seq.cmp(&b.seq))
        });
    }

    /// Remove all registered detectors.
    pub fn clear(&mut self) {
        self.detectors.clear();
    }

    /// All detectors in evaluation order.
    #[must_use]
    pub fn get_detectors(&self) -> Vec<&dyn FormatDetector> {
        self.detectors.iter().map(|r| r.detector.as_ref()).collect()
    }

    /// Classify the input.
    ///
    /// Returns the format of the first matching detector, or `None` when no
    /// detector matches. Detector failures are logged and skipped.
    pub async fn detect_format(&self, input: &ContentInput) -> Option<FormatId> {
        for registered in &self.detectors {
            let detector = registered.detector.as_ref();
            match detector.detect(input).await {
                Ok(true) => return Some(detector.format()),
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        detector = detector.id(),
                        error = %err,
                        "Detector failed, continuing scan"
                    );
                }
            }
        }
        None
    }
}

impl Default for FormatDetectorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
