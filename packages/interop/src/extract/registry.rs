//! Priority-dispatch registry for element extractors.

use std::collections::HashMap;
use std::sync::Arc;

use roxmltree::Node;

use super::{ElementExtractor, ExtractionContext, ExtractionError, ExtractionOutcome};
use crate::error::{InteropError, Result};
use crate::xml::tag_name;

struct RankedExtractor<T> {
    /// Registration order, the explicit tie-break for equal priorities.
    seq: u64,
    extractor: Arc<dyn ElementExtractor<T>>,
}

impl<T> Clone for RankedExtractor<T> {
    fn clone(&self) -> Self {
        Self {
            seq: self.seq,
            extractor: Arc::clone(&self.extractor),
        }
    }
}

/// Registry mapping element types to extractors, dispatched by priority.
///
/// Within an element-type bucket, extractors are ordered by priority
/// descending; equal priorities keep registration order. Exactly one
/// extractor wins per element, never a combination: a specialized rule with
/// a high priority and a narrow `can_handle` shadows the broad built-in rule
/// without modifying it.
pub struct ExtractionRegistry<T> {
    by_id: HashMap<String, Arc<dyn ElementExtractor<T>>>,
    buckets: HashMap<String, Vec<RankedExtractor<T>>>,
    next_seq: u64,
}

impl<T> ExtractionRegistry<T> {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            buckets: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Register an extractor.
    ///
    /// # Errors
    /// Returns [`InteropError::Registry`] for a duplicate id or an empty
    /// element-type set. On error the registry is left unmodified.
    pub fn register(&mut self, extractor: impl ElementExtractor<T> + 'static) -> Result<()> {
        self.register_arc(Arc::new(extractor))
    }

    /// Register an already shared extractor instance.
    ///
    /// # Errors
    /// Same contract as [`Self::register`].
    pub fn register_arc(&mut self, extractor: Arc<dyn ElementExtractor<T>>) -> Result<()> {
        let id = extractor.id().to_string();
        if self.by_id.contains_key(&id) {
            return Err(InteropError::Registry(format!(
                "extractor id '{id}' is already registered"
            )));
        }
        if extractor.element_types().is_empty() {
            return Err(InteropError::Registry(format!(
                "extractor '{id}' declares no element types"
            )));
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        for element_type in extractor.element_types() {
            let bucket = self.buckets.entry((*element_type).to_string()).or_default();
            bucket.push(RankedExtractor {
                seq,
                extractor: Arc::clone(&extractor),
            });
            bucket.sort_by(|a, b| {
                b.extractor
                    .priority()
                    .cmp(&a.extractor.priority())
                    .then(a.seq.cmp(&b.seq))
            });
        }
        self.by_id.insert(id, extractor);
        Ok(())
    }

    /// Remove an extractor by id from the id map and every type bucket.
    ///
    /// Returns `true` when the extractor was present.
    pub fn unregister(&mut self, id: &str) -> bool {
        if self.by_id.remove(id).is_none() {
            return false;
        }
        for bucket in self.buckets.values_mut() {
            bucket.retain(|ranked| ranked.extractor.id() != id);
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        true
    }

    /// Remove all extractors.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.buckets.clear();
    }

    /// Whether an extractor with this id is registered.
    #[must_use]
    pub fn has_extractor(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Whether any extractor is registered for this element type.
    #[must_use]
    pub fn has_type(&self, element_type: &str) -> bool {
        self.buckets.contains_key(element_type)
    }

    /// All registered extractors, in no particular order.
    #[must_use]
    pub fn get_extractors(&self) -> Vec<&dyn ElementExtractor<T>> {
        self.by_id.values().map(|e| e.as_ref()).collect()
    }

    /// Extractors for one element type, in dispatch order.
    #[must_use]
    pub fn get_extractors_for_type(&self, element_type: &str) -> Vec<&dyn ElementExtractor<T>> {
        self.buckets
            .get(element_type)
            .map(|bucket| bucket.iter().map(|r| r.extractor.as_ref()).collect())
            .unwrap_or_default()
    }

    /// Sorted list of element types with at least one extractor.
    #[must_use]
    pub fn known_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.buckets.keys().cloned().collect();
        types.sort();
        types
    }

    /// Find the winning extractor for an element.
    ///
    /// Consults the call-scoped dispatch cache first; otherwise scans the
    /// element-type bucket in priority order and caches the first extractor
    /// whose `can_handle` returns `true`. A failing `can_handle` is logged
    /// and treated as a non-match.
    #[must_use]
    pub fn find_extractor(
        &self,
        element: Node<'_, '_>,
        ctx: &ExtractionContext<'_, '_>,
    ) -> Option<Arc<dyn ElementExtractor<T>>> {
        let node_key = element.id();
        if let Some(cached_id) = ctx.cached_extractor(node_key) {
            return self.by_id.get(&cached_id).map(Arc::clone);
        }

        let bucket = self.buckets.get(tag_name(element))?;
        for ranked in bucket {
            match ranked.extractor.can_handle(element, ctx) {
                Ok(true) => {
                    ctx.cache_extractor(node_key, ranked.extractor.id());
                    return Some(Arc::clone(&ranked.extractor));
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        extractor = ranked.extractor.id(),
                        element = tag_name(element),
                        error = %err,
                        "can_handle failed, treating as non-match"
                    );
                }
            }
        }
        None
    }

    /// Extract typed data from an element.
    ///
    /// Absence of a matching extractor is a failure outcome that enumerates
    /// the registered element types for diagnosability. A failing `validate`
    /// becomes a failure outcome; its warnings attach to success.
    #[must_use]
    pub fn extract(
        &self,
        element: Node<'_, '_>,
        ctx: &ExtractionContext<'_, '_>,
    ) -> ExtractionOutcome<T> {
        let element_type = tag_name(element).to_string();

        let Some(extractor) = self.find_extractor(element, ctx) else {
            return ExtractionOutcome::Failure {
                error: ExtractionError {
                    message: format!(
                        "no extractor can handle this element; registered types: [{}]",
                        self.known_types().join(", ")
                    ),
                    extractor_id: None,
                    element_type,
                },
            };
        };

        let data = match extractor.extract(element, ctx) {
            Ok(data) => data,
            Err(err) => {
                return ExtractionOutcome::Failure {
                    error: ExtractionError {
                        message: err.to_string(),
                        extractor_id: Some(extractor.id().to_string()),
                        element_type,
                    },
                };
            }
        };

        let validation = extractor.validate(&data);
        if !validation.valid {
            return ExtractionOutcome::Failure {
                error: ExtractionError {
                    message: format!("validation failed: {}", validation.errors.join("; ")),
                    extractor_id: Some(extractor.id().to_string()),
                    element_type,
                },
            };
        }

        ExtractionOutcome::Success {
            data,
            warnings: validation.warnings,
        }
    }

    /// Produce an independent registry holding the same extractor instances.
    #[must_use]
    pub fn clone_registry(&self) -> Self {
        Self {
            by_id: self
                .by_id
                .iter()
                .map(|(k, v)| (k.clone(), Arc::clone(v)))
                .collect(),
            buckets: self
                .buckets
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            next_seq: self.next_seq,
        }
    }
}

impl<T> Default for ExtractionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
